//! Scripted NNTP server over an in-memory duplex stream

use super::FakeGroup;
use nntp_harvest::{HeaderField, compact};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;

/// Server behaviour knobs
#[derive(Debug, Clone)]
pub struct StubConfig {
    pub greeting: &'static str,
    pub username: String,
    pub password: String,
    /// Answer AUTHINFO USER with 281 instead of asking for a password
    pub user_only: bool,
    /// Article id range (`lower`) whose XZHDR requests get a 503
    pub refuse_window: Option<u64>,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            greeting: "200 stub server ready",
            username: "alice".to_string(),
            password: "secret".to_string(),
            user_only: false,
            refuse_window: None,
        }
    }
}

/// Running stub; `commands` records every line the client sent
pub struct StubServer {
    pub commands: Arc<Mutex<Vec<String>>>,
    pub handle: JoinHandle<()>,
}

impl StubServer {
    /// Serve `group` on a fresh duplex pair, returning the client half
    pub fn spawn(group: FakeGroup, config: StubConfig) -> (DuplexStream, StubServer) {
        let (client_io, server_io) = tokio::io::duplex(1 << 20);
        let commands = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&commands);

        let handle = tokio::spawn(async move {
            let _ = serve(server_io, group, config, log).await;
        });

        (client_io, StubServer { commands, handle })
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

async fn serve(
    io: DuplexStream,
    group: FakeGroup,
    config: StubConfig,
    log: Arc<Mutex<Vec<String>>>,
) -> std::io::Result<()> {
    let (read_half, mut writer) = tokio::io::split(io);
    let mut lines = BufReader::new(read_half).lines();

    writer
        .write_all(format!("{}\r\n", config.greeting).as_bytes())
        .await?;

    while let Some(line) = lines.next_line().await? {
        log.lock().unwrap().push(line.clone());
        let mut words = line.splitn(3, ' ');
        let verb = words.next().unwrap_or_default().to_ascii_uppercase();

        let reply: Vec<u8> = match verb.as_str() {
            "AUTHINFO" => {
                let kind = words.next().unwrap_or_default().to_ascii_uppercase();
                let value = words.next().unwrap_or_default();
                match kind.as_str() {
                    "USER" if value == config.username && config.user_only => {
                        b"281 Authentication accepted\r\n".to_vec()
                    }
                    "USER" => b"381 Password required\r\n".to_vec(),
                    "PASS" if value == config.password => {
                        b"281 Authentication accepted\r\n".to_vec()
                    }
                    _ => b"481 Authentication rejected\r\n".to_vec(),
                }
            }
            "GROUP" => {
                let name = words.next().unwrap_or_default();
                if name == group.name {
                    format!(
                        "211 {} {} {} {}\r\n",
                        group.articles.len(),
                        group.low(),
                        group.high(),
                        group.name
                    )
                    .into_bytes()
                } else {
                    b"411 No such newsgroup\r\n".to_vec()
                }
            }
            "XZHDR" => xzhdr_reply(&group, &config, words.next(), words.next()),
            "QUIT" => {
                writer.write_all(b"205 Bye\r\n").await?;
                writer.flush().await?;
                return Ok(());
            }
            _ => b"500 Unknown command\r\n".to_vec(),
        };

        writer.write_all(&reply).await?;
        writer.flush().await?;
    }

    Ok(())
}

fn xzhdr_reply(
    group: &FakeGroup,
    config: &StubConfig,
    field: Option<&str>,
    range: Option<&str>,
) -> Vec<u8> {
    let field = HeaderField::TRACKED
        .into_iter()
        .find(|f| Some(f.wire_name()) == field);
    let range = range.and_then(|r| {
        let (lower, upper) = r.split_once('-')?;
        Some((lower.parse::<u64>().ok()?, upper.parse::<u64>().ok()?))
    });

    let (Some(field), Some((lower, upper))) = (field, range) else {
        return b"501 Syntax error\r\n".to_vec();
    };
    if config.refuse_window == Some(lower) {
        return b"503 Program fault\r\n".to_vec();
    }

    let block = compact::encode(&group.plaintext(field, lower, upper)).unwrap();
    let mut reply = b"221 Header follows (compressed)\r\n".to_vec();
    reply.extend_from_slice(&block);
    reply.extend_from_slice(b"\r\n.\r\n");
    reply
}
