//! Remote `StorageWrite` Adapter
//!
//! Implements the [`StorageWrite`] port over the `inflow.v1.StorageWrite`
//! gRPC service. The `AppendRows` transport is a full-duplex stream capable
//! of pipelining, but this adapter deliberately runs it in lockstep: one
//! request out, one response in, per [`append`](StorageWrite::append) call.
//! The caller never has more than one batch in flight.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::codec::Streaming;
use tonic::transport::Channel;

use crate::application::ports::{
    AppendAck, AppendBatch, SinkError, StorageWrite, StreamRef, TablePath,
};

use super::proto;
use super::proto::storage_write_client::StorageWriteClient;

/// Outbound request queue depth. Only one request is ever in flight, so this
/// only needs to absorb the send/ack handoff.
const REQUEST_QUEUE_CAPACITY: usize = 16;

/// Connection settings for the remote store.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// gRPC endpoint of the `StorageWrite` service.
    pub endpoint: String,
}

impl RemoteConfig {
    /// Create a config for the given endpoint.
    #[must_use]
    pub const fn new(endpoint: String) -> Self {
        Self { endpoint }
    }
}

/// Live `AppendRows` connection: request sender plus ordered response stream.
struct AppendChannel {
    tx: mpsc::Sender<proto::AppendRowsRequest>,
    responses: Streaming<proto::AppendRowsResponse>,
}

/// gRPC-backed implementation of the [`StorageWrite`] port.
pub struct RemoteStorageWriter {
    client: StorageWriteClient<Channel>,
    append: Option<AppendChannel>,
}

impl RemoteStorageWriter {
    /// Connect to the remote store.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Transport`] when the endpoint is unreachable.
    pub async fn connect(config: RemoteConfig) -> Result<Self, SinkError> {
        let client = StorageWriteClient::connect(config.endpoint)
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            append: None,
        })
    }

    /// Open the bidirectional `AppendRows` connection. Deferred to the first
    /// append so a session that never writes never opens one.
    async fn open_append_channel(&mut self) -> Result<AppendChannel, SinkError> {
        let (tx, rx) = mpsc::channel::<proto::AppendRowsRequest>(REQUEST_QUEUE_CAPACITY);
        let outbound = ReceiverStream::new(rx);

        let responses = self
            .client
            .append_rows(outbound)
            .await
            .map_err(|status| SinkError::Transport(status.to_string()))?
            .into_inner();

        Ok(AppendChannel { tx, responses })
    }
}

/// Build the wire request for one batch.
fn append_request(stream: &StreamRef, batch: AppendBatch) -> proto::AppendRowsRequest {
    proto::AppendRowsRequest {
        write_stream: stream.name.clone(),
        proto_rows: Some(proto::ProtoData {
            writer_schema: batch.writer_schema.map(|descriptor| proto::ProtoSchema {
                proto_descriptor: Some(descriptor),
            }),
            rows: Some(proto::ProtoRows {
                serialized_rows: batch.rows,
            }),
        }),
    }
}

#[async_trait]
impl StorageWrite for RemoteStorageWriter {
    async fn create_stream(&mut self, table: &TablePath) -> Result<StreamRef, SinkError> {
        let request = proto::CreateWriteStreamRequest {
            parent: table.parent(),
            write_stream: Some(proto::WriteStream {
                name: String::new(),
                r#type: proto::write_stream::Type::Committed as i32,
            }),
        };

        let stream = self
            .client
            .create_write_stream(request)
            .await
            .map_err(|status| SinkError::CreateStream(status.to_string()))?
            .into_inner();

        Ok(StreamRef { name: stream.name })
    }

    async fn append(
        &mut self,
        stream: &StreamRef,
        batch: AppendBatch,
    ) -> Result<AppendAck, SinkError> {
        if self.append.is_none() {
            let channel = self.open_append_channel().await?;
            self.append = Some(channel);
        }
        let Some(channel) = self.append.as_mut() else {
            return Err(SinkError::Transport("append channel unavailable".to_string()));
        };

        channel
            .tx
            .send(append_request(stream, batch))
            .await
            .map_err(|_| SinkError::Append {
                message: "append connection closed".to_string(),
            })?;

        // Responses arrive in request order; with one request in flight the
        // next response acknowledges exactly this batch.
        let response = channel
            .responses
            .message()
            .await
            .map_err(|status| SinkError::Append {
                message: status.to_string(),
            })?
            .ok_or_else(|| SinkError::Append {
                message: "append connection ended before acknowledgment".to_string(),
            })?;

        if let Some(error) = response.error {
            return Err(SinkError::Append {
                message: format!("{} (code {})", error.message, error.code),
            });
        }

        let result = response.append_result.ok_or_else(|| SinkError::Append {
            message: "acknowledgment carried no append result".to_string(),
        })?;

        Ok(AppendAck {
            offset: result.offset,
            row_count: result.row_count,
        })
    }

    async fn close_stream(&mut self, stream: &StreamRef) -> Result<(), SinkError> {
        // Dropping the sender half-closes the AppendRows connection.
        self.append = None;

        self.client
            .close_write_stream(proto::CloseWriteStreamRequest {
                name: stream.name.clone(),
            })
            .await
            .map_err(|status| SinkError::CloseStream(status.to_string()))?;

        Ok(())
    }
}
