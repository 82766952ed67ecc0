use crate::auth::authenticate;
use crate::error::ServerError;
use crate::metrics::{counters, gauges, histograms};
use crate::ratelimit::Verdict;
use crate::server::ServerState;
use chrono::Local;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::info;

const LOGIN_OK: &str = "Login successful.";
const LOGIN_REJECTED: &str = "Invalid username or password.";

pub async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    state: Arc<ServerState>,
) -> Result<(), ServerError> {
    let (mut reader, mut writer) = stream.split();

    // Authentication phase: one frame, one round-trip, no retries. Bounded
    // so an idle pre-auth socket cannot hold its slot forever.
    let login = timeout(
        Duration::from_secs(state.config.login_timeout),
        authenticate(&mut reader, &state.credentials, state.config.max_frame),
    )
    .await;

    let user = match login {
        Ok(Ok(user)) => user,
        Ok(Err(e @ (ServerError::MalformedLogin | ServerError::InvalidCredentials))) => {
            counters::logins_total("rejected");
            let _ = writer.write_all(LOGIN_REJECTED.as_bytes()).await;
            return Err(e);
        }
        Ok(Err(e)) => return Err(e),
        Err(_) => {
            counters::logins_total("timeout");
            tracing::debug!("login timed out for {}", peer_addr);
            return Err(ServerError::LoginTimeout);
        }
    };

    counters::logins_total("accepted");
    writer.write_all(LOGIN_OK.as_bytes()).await?;
    info!("User {} connected.", user);
    gauges::inc_sessions_active();

    let result = run_request_loop(&mut reader, &mut writer, &user, &state).await;

    gauges::dec_sessions_active();
    info!("User {} disconnected.", user);
    result
}

/// Drive the read → quote → write loop for an authenticated session.
///
/// Terminates on peer close (silently), on lockout (after notifying the
/// client), or on an I/O fault.
async fn run_request_loop<R, W>(
    reader: &mut R,
    writer: &mut W,
    user: &str,
    state: &ServerState,
) -> Result<(), ServerError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; state.config.max_frame];

    loop {
        // The session is consumed as soon as a standing block is observed,
        // whatever the remaining duration.
        if let Some(remaining) = state.limiter.block_remaining(user) {
            counters::requests_total("blocked");
            writer
                .write_all(retry_after_notice(remaining).as_bytes())
                .await?;
            return Ok(());
        }

        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        // One read is one frame; no delimiter scan, no reassembly.
        let request = String::from_utf8_lossy(&buf[..n]);

        let start = Instant::now();
        match state.rates.quote(&request) {
            Err(reject) => {
                // Invalid requests are reported inline and never counted.
                counters::requests_total("invalid");
                writer.write_all(reject.to_string().as_bytes()).await?;
            }
            Ok(response) => {
                histograms::request_latency_seconds(start.elapsed().as_secs_f64());
                counters::requests_total("served");
                writer.write_all(response.as_bytes()).await?;
                info!("User {} requested {}: {}", user, request, response);

                if state.limiter.record(user) == Verdict::LimitReached {
                    counters::lockouts_total();
                    let block = Duration::from_secs(state.config.block_secs);
                    writer.write_all(lockout_notice(block).as_bytes()).await?;
                    return Ok(());
                }
            }
        }
    }
}

fn retry_after_notice(remaining: Duration) -> String {
    let expiry = Local::now() + remaining;
    format!("Too many requests. Try again after {}.", expiry.format("%H:%M"))
}

fn lockout_notice(block: Duration) -> String {
    format!(
        "Too many requests. You are blocked for {}.",
        human_duration(block)
    )
}

fn human_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        let minutes = secs / 60;
        if minutes == 1 {
            "1 minute".to_string()
        } else {
            format!("{minutes} minutes")
        }
    } else if secs == 1 {
        "1 second".to_string()
    } else {
        format!("{secs} seconds")
    }
}
