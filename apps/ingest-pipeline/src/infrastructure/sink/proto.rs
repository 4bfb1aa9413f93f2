//! `inflow.v1` wire contract for the remote store's `StorageWrite` service.
//!
//! Three RPCs:
//!
//! - `CreateWriteStream` (unary): request one write stream under a table.
//!   Committed mode makes acknowledged rows immediately visible, with no
//!   separate finalize step.
//! - `AppendRows` (bidirectional streaming): the first request carries the
//!   writer schema; subsequent requests carry rows only. The server answers
//!   each request with exactly one response, in order.
//! - `CloseWriteStream` (unary): release the stream.

/// One write stream at the remote store.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WriteStream {
    /// Server-assigned resource name, of the form
    /// `projects/{p}/datasets/{d}/tables/{t}/streams/{s}`.
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    /// Visibility mode of the stream.
    #[prost(enumeration = "write_stream::Type", tag = "2")]
    pub r#type: i32,
}
/// Nested message and enum types in `WriteStream`.
pub mod write_stream {
    /// Visibility mode of a write stream.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Type {
        /// Unknown type.
        Unspecified = 0,
        /// Rows are visible as soon as their batch is acknowledged.
        Committed = 1,
        /// Rows are buffered until the stream is finalized.
        Pending = 2,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateWriteStreamRequest {
    /// Table resource name the stream is created under.
    #[prost(string, tag = "1")]
    pub parent: ::prost::alloc::string::String,
    /// Template for the stream to create; only `type` is honored.
    #[prost(message, optional, tag = "2")]
    pub write_stream: ::core::option::Option<WriteStream>,
}

/// Protobuf schema describing the serialized rows of a stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoSchema {
    /// Descriptor of the row message type.
    #[prost(message, optional, tag = "1")]
    pub proto_descriptor: ::core::option::Option<::prost_types::DescriptorProto>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoRows {
    /// Serialized row messages, in append order.
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub serialized_rows: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
}

/// Rows plus, on the first request of a connection, their schema.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoData {
    /// Writer schema. Required on the first request, omitted afterwards.
    #[prost(message, optional, tag = "1")]
    pub writer_schema: ::core::option::Option<ProtoSchema>,
    /// The rows to append.
    #[prost(message, optional, tag = "2")]
    pub rows: ::core::option::Option<ProtoRows>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AppendRowsRequest {
    /// Stream to append to.
    #[prost(string, tag = "1")]
    pub write_stream: ::prost::alloc::string::String,
    /// Row payload.
    #[prost(message, optional, tag = "2")]
    pub proto_rows: ::core::option::Option<ProtoData>,
}

/// Successful acknowledgment of one batch.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AppendResult {
    /// Offset of the batch within the stream.
    #[prost(int64, tag = "1")]
    pub offset: i64,
    /// Number of rows committed.
    #[prost(int64, tag = "2")]
    pub row_count: i64,
}

/// Per-batch failure detail.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StorageError {
    /// Numeric error code.
    #[prost(int32, tag = "1")]
    pub code: i32,
    /// Human-readable failure description.
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AppendRowsResponse {
    /// Present when the batch committed.
    #[prost(message, optional, tag = "1")]
    pub append_result: ::core::option::Option<AppendResult>,
    /// Present when the batch was rejected.
    #[prost(message, optional, tag = "2")]
    pub error: ::core::option::Option<StorageError>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CloseWriteStreamRequest {
    /// Stream resource name to release.
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CloseWriteStreamResponse {
    /// Total rows committed to the stream over its lifetime.
    #[prost(int64, tag = "1")]
    pub row_count: i64,
}

/// Generated client implementations.
pub mod storage_write_client {
    #![allow(
        unused_variables,
        dead_code,
        missing_docs,
        clippy::wildcard_imports,
        clippy::let_unit_value,
    )]
    use tonic::codegen::*;
    use tonic::codegen::http::Uri;
    #[derive(Debug, Clone)]
    pub struct StorageWriteClient<T> {
        inner: tonic::client::Grpc<T>,
    }
    impl StorageWriteClient<tonic::transport::Channel> {
        /// Attempt to create a new client by connecting to a given endpoint.
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }
    impl<T> StorageWriteClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::Body>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }
        pub fn with_origin(inner: T, origin: Uri) -> Self {
            let inner = tonic::client::Grpc::with_origin(inner, origin);
            Self { inner }
        }
        /// Limits the maximum size of a decoded message.
        ///
        /// Default: `4MB`
        #[must_use]
        pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
            self.inner = self.inner.max_decoding_message_size(limit);
            self
        }
        /// Limits the maximum size of an encoded message.
        ///
        /// Default: `usize::MAX`
        #[must_use]
        pub fn max_encoding_message_size(mut self, limit: usize) -> Self {
            self.inner = self.inner.max_encoding_message_size(limit);
            self
        }
        pub async fn create_write_stream(
            &mut self,
            request: impl tonic::IntoRequest<super::CreateWriteStreamRequest>,
        ) -> std::result::Result<tonic::Response<super::WriteStream>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| {
                    tonic::Status::unknown(
                        format!("Service was not ready: {}", e.into()),
                    )
                })?;
            let codec = tonic_prost::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(
                "/inflow.v1.StorageWrite/CreateWriteStream",
            );
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("inflow.v1.StorageWrite", "CreateWriteStream"));
            self.inner.unary(req, path, codec).await
        }
        pub async fn append_rows(
            &mut self,
            request: impl tonic::IntoStreamingRequest<Message = super::AppendRowsRequest>,
        ) -> std::result::Result<
            tonic::Response<tonic::codec::Streaming<super::AppendRowsResponse>>,
            tonic::Status,
        > {
            self.inner
                .ready()
                .await
                .map_err(|e| {
                    tonic::Status::unknown(
                        format!("Service was not ready: {}", e.into()),
                    )
                })?;
            let codec = tonic_prost::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(
                "/inflow.v1.StorageWrite/AppendRows",
            );
            let mut req = request.into_streaming_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("inflow.v1.StorageWrite", "AppendRows"));
            self.inner.streaming(req, path, codec).await
        }
        pub async fn close_write_stream(
            &mut self,
            request: impl tonic::IntoRequest<super::CloseWriteStreamRequest>,
        ) -> std::result::Result<
            tonic::Response<super::CloseWriteStreamResponse>,
            tonic::Status,
        > {
            self.inner
                .ready()
                .await
                .map_err(|e| {
                    tonic::Status::unknown(
                        format!("Service was not ready: {}", e.into()),
                    )
                })?;
            let codec = tonic_prost::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(
                "/inflow.v1.StorageWrite/CloseWriteStream",
            );
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("inflow.v1.StorageWrite", "CloseWriteStream"));
            self.inner.unary(req, path, codec).await
        }
    }
}
