use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use mindmap_core::{ErrorKind, LayoutConfig, Msg};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::bytes::Bytes;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::archive::ArchiveStore;
use crate::session::Session;
use crate::storage::KvStore;

/// Shared by every connection; the lock covers one whole read-modify-write.
type SharedArchive<S> = Arc<Mutex<ArchiveStore<S>>>;

pub async fn run<S>(sock_path: &str, archive: ArchiveStore<S>, layout: LayoutConfig) -> Result<()>
where
    S: KvStore + Send + 'static,
{
    // Clean stale socket
    let _ = std::fs::remove_file(sock_path);
    let listener =
        UnixListener::bind(sock_path).with_context(|| format!("failed to bind UDS {sock_path}"))?;
    tracing::info!(socket = sock_path, "mindmap-agent listening");

    let archive: SharedArchive<S> = Arc::new(Mutex::new(archive));
    loop {
        let (stream, _addr) = listener.accept().await.context("accept failed")?;
        let archive = Arc::clone(&archive);
        let layout = layout.clone();
        tokio::spawn(async move {
            if let Err(err) = serve_connection(stream, archive, layout).await {
                tracing::warn!(error = ?err, "render target connection failed");
            }
        });
    }
}

async fn serve_connection<S: KvStore>(
    stream: UnixStream,
    archive: SharedArchive<S>,
    layout: LayoutConfig,
) -> Result<()> {
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());
    let mut session = Session::new(layout);
    tracing::info!("render target connected");

    while let Some(frame) = framed.next().await {
        let bytes = frame.context("failed to read frame")?;
        for reply in dispatch(&mut session, &archive, &bytes) {
            framed.send(Bytes::from(serde_json::to_vec(&reply)?)).await?;
        }
    }

    tracing::info!("render target disconnected");
    Ok(())
}

fn dispatch<S: KvStore>(
    session: &mut Session,
    archive: &SharedArchive<S>,
    bytes: &[u8],
) -> Vec<Msg> {
    match serde_json::from_slice::<Msg>(bytes) {
        Ok(msg) => {
            tracing::debug!(msg = msg.name(), "request");
            let mut archive = archive.lock().unwrap_or_else(PoisonError::into_inner);
            session.handle(msg, &mut archive)
        }
        Err(err) => {
            tracing::warn!(error = %err, "undecodable frame");
            vec![Msg::error(ErrorKind::BadRequest, format!("decode error: {err}"))]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    async fn roundtrip(
        client: &mut Framed<UnixStream, LengthDelimitedCodec>,
        msg: &Msg,
        replies: usize,
    ) -> Vec<Msg> {
        client
            .send(Bytes::from(serde_json::to_vec(msg).expect("encode")))
            .await
            .expect("send");
        let mut out = Vec::new();
        for _ in 0..replies {
            let frame = client.next().await.expect("frame").expect("read");
            out.push(serde_json::from_slice(&frame).expect("decode reply"));
        }
        out
    }

    #[tokio::test]
    async fn serves_a_generated_map_over_a_socket() {
        let (server_end, client_end) = UnixStream::pair().expect("socket pair");
        let archive: SharedArchive<MemoryStore> =
            Arc::new(Mutex::new(ArchiveStore::new(MemoryStore::default(), "test")));
        let handle = tokio::spawn(serve_connection(
            server_end,
            Arc::clone(&archive),
            LayoutConfig::default(),
        ));
        let mut client = Framed::new(client_end, LengthDelimitedCodec::new());

        let hello = roundtrip(&mut client, &Msg::Hello { version: "test".into() }, 1).await;
        assert_eq!(hello[0].name(), "Hello");

        let resize = Msg::Resize {
            width: 800.0,
            height: 600.0,
        };
        let resize = roundtrip(&mut client, &resize, 0).await;
        assert!(resize.is_empty());

        let generated = Msg::Generated {
            file_name: "doc.pdf".to_string(),
            payload: json!({
                "title": "Doc",
                "summary": "s",
                "children": [{"title": "A", "summary": "a"}]
            }),
        };
        let out = roundtrip(&mut client, &generated, 4).await;
        let names: Vec<_> = out.iter().map(Msg::name).collect();
        assert_eq!(names, vec!["Archive", "MapLoaded", "Layout", "Emphasis"]);

        drop(client);
        handle.await.expect("join").expect("connection ends cleanly");
        assert_eq!(archive.lock().expect("lock").list().len(), 1);
    }

    #[test]
    fn garbage_frames_get_a_bad_request() {
        let archive: SharedArchive<MemoryStore> =
            Arc::new(Mutex::new(ArchiveStore::new(MemoryStore::default(), "test")));
        let mut session = Session::new(LayoutConfig::default());

        let out = dispatch(&mut session, &archive, b"{\"type\":\"Nope\"}");

        assert!(matches!(
            out.as_slice(),
            [Msg::Error { kind: ErrorKind::BadRequest, .. }]
        ));
    }
}
