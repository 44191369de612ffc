use std::sync::Arc;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use ulid::Ulid;

use crate::api::{Ack, ApiError, ErrorFrame, FolioService, Request};
use crate::limits::MAX_LINE_LEN;
use crate::observability;

/// Serve one connection: an authenticate frame, then one JSON request per
/// line until the client disconnects. Plain TCP, or TLS when an acceptor
/// is configured.
pub async fn process_connection(
    socket: TcpStream,
    service: Arc<FolioService>,
    tls: Option<TlsAcceptor>,
) -> std::io::Result<()> {
    match tls {
        Some(acceptor) => serve(acceptor.accept(socket).await?, service).await,
        None => serve(socket, service).await,
    }
}

async fn serve<S>(stream: S, service: Arc<FolioService>) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LEN));

    let Some(requester_id) = handshake(&mut framed, &service).await? else {
        return Ok(());
    };

    while let Some(line) = framed.next().await {
        let line = line.map_err(codec_err)?;
        let req: Request = match serde_json::from_str(&line) {
            Ok(req) => req,
            Err(e) => {
                send(&mut framed, &ErrorFrame::protocol(format!("malformed request: {e}")))
                    .await?;
                continue;
            }
        };
        if let Request::Authenticate { .. } = req {
            send(&mut framed, &ErrorFrame::protocol("already authenticated")).await?;
            continue;
        }

        let op = observability::op_label(&req);
        let started = Instant::now();
        let result = service.execute(requester_id, req).await;
        metrics::histogram!(observability::OP_DURATION_SECONDS, "op" => op)
            .record(started.elapsed().as_secs_f64());
        let status = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        metrics::counter!(observability::OPS_TOTAL, "op" => op, "status" => status)
            .increment(1);

        match result {
            Ok(resp) => send(&mut framed, &resp).await?,
            Err(e) => send(&mut framed, &ErrorFrame::from(&e)).await?,
        }
    }
    Ok(())
}

/// Run the authenticate step. `None` means the session was refused and the
/// refusal already answered.
async fn handshake<S>(
    framed: &mut Framed<S, LinesCodec>,
    service: &FolioService,
) -> std::io::Result<Option<Ulid>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(line) = framed.next().await else {
        // Client went away before authenticating.
        return Ok(None);
    };
    let line = line.map_err(codec_err)?;

    let key = match serde_json::from_str::<Request>(&line) {
        Ok(Request::Authenticate { key }) => key,
        Ok(_) => {
            metrics::counter!(observability::AUTH_FAILURES_TOTAL).increment(1);
            send(framed, &ErrorFrame::protocol("expected an authenticate frame")).await?;
            return Ok(None);
        }
        Err(e) => {
            metrics::counter!(observability::AUTH_FAILURES_TOTAL).increment(1);
            send(framed, &ErrorFrame::protocol(format!("malformed request: {e}"))).await?;
            return Ok(None);
        }
    };

    match service.authenticate(&key).await {
        Some(id) => {
            send(framed, &Ack { success: true, message: "Authenticated" }).await?;
            Ok(Some(id))
        }
        None => {
            metrics::counter!(observability::AUTH_FAILURES_TOTAL).increment(1);
            tracing::warn!("session refused: unknown access key");
            send(framed, &ErrorFrame::from(&ApiError::Authorization)).await?;
            Ok(None)
        }
    }
}

async fn send<S, T>(framed: &mut Framed<S, LinesCodec>, body: &T) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    T: Serialize,
{
    let line = serde_json::to_string(body).map_err(std::io::Error::other)?;
    framed.send(line).await.map_err(codec_err)
}

fn codec_err(e: LinesCodecError) -> std::io::Error {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "line too long")
        }
        LinesCodecError::Io(e) => e,
    }
}
