use cadence::NopMetricSink;
use cadence::QueuingMetricSink;
use cadence::StatsdClient;
use cadence::UdpMetricSink;
use db_rpc_client_rs::DbRpcClient;
use db_rpc_client_rs::DbRpcClientCfg;
use db_rpc_client_rs::DbRpcDbClient;
use std::net::UdpSocket;
use std::sync::Arc;

pub mod cfg;
pub mod error;
pub mod link_parents;
pub mod load_comments;
pub mod load_posts;
pub mod msgpack;
pub mod pending;
pub mod pipeline;
pub mod record;
pub mod shard;
pub mod store;

pub fn create_db_client(
  endpoint: impl Into<String>,
  api_key: Option<String>,
  database: &str,
) -> DbRpcDbClient {
  DbRpcClient::new(DbRpcClientCfg {
    api_key,
    endpoint: endpoint.into(),
  })
  .database(database)
}

/// StatsD client sending to `addr` (host:port), or discarding everything if there's no address.
pub fn create_statsd(prefix: &'static str, addr: Option<&str>) -> std::io::Result<Arc<StatsdClient>> {
  let Some(addr) = addr else {
    return Ok(Arc::new(StatsdClient::from_sink(prefix, NopMetricSink)));
  };
  let socket = UdpSocket::bind("0.0.0.0:0")?;
  socket.set_nonblocking(true)?;
  let sink = UdpMetricSink::from(addr, socket)
    .map_err(|err| std::io::Error::other(err.to_string()))?;
  let sink = QueuingMetricSink::from(sink);
  Ok(Arc::new(StatsdClient::from_sink(prefix, sink)))
}

#[cfg(test)]
mod tests {
  use super::create_statsd;

  #[test]
  fn test_statsd_without_address() {
    assert!(create_statsd("seed", None).is_ok());
  }

  #[test]
  fn test_statsd_bad_address() {
    let err = create_statsd("seed", Some("not an address")).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::Other);
  }
}
