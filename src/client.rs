//! Client-side façade: connect/disconnect/subscribe/unsubscribe against a
//! running server, plus a notification-draining loop.
//!
//! Grounded in the reference's `api.c`: create the three session pipes,
//! send a framed request, open the response pipe fresh for each reply.

use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::warn;

use crate::config::ClientConfig;
use crate::consts::RESPONSE_FRAME_LEN;
use crate::ipc::{
    create_fifo, open_read_blocking, open_read_nonblocking, open_write_blocking,
};
use crate::protocol::{ConnectFrame, OpCode, Request, Response};

pub struct Client {
    req_path: PathBuf,
    resp_path: PathBuf,
    notif_path: PathBuf,
    notif_file: std::fs::File,
}

impl Client {
    /// Create the three session pipes and send the registration frame.
    /// Returns the connected client, or an error if the server rejected it
    /// (session table full) or any I/O step failed.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let req_path = config.req_path();
        let resp_path = config.resp_path();
        let notif_path = config.notif_path();

        create_fifo(&req_path)?;
        create_fifo(&resp_path)?;
        create_fifo(&notif_path)?;

        // Open our read end of the notification pipe before announcing
        // ourselves: the server opens its write end non-blocking, which
        // fails outright (ENXIO) rather than waiting if no reader exists yet.
        let notif_file = open_read_nonblocking(&notif_path)
            .context("connect: opening notification pipe")?;

        let frame = ConnectFrame {
            req_path: req_path.to_string_lossy().into_owned(),
            resp_path: resp_path.to_string_lossy().into_owned(),
            notif_path: notif_path.to_string_lossy().into_owned(),
        };
        let encoded = frame.encode()?;

        let mut server = open_write_blocking(&config.register_pipe_path)
            .context("connect: opening registration pipe")?;
        server.write_all(&encoded)?;
        drop(server);

        let mut resp = open_read_blocking(&resp_path).context("connect: opening response pipe")?;
        let mut buf = [0u8; RESPONSE_FRAME_LEN];
        resp.read_exact(&mut buf)?;
        let ack = Response::decode(&buf)?;
        if ack.result != 0 {
            anyhow::bail!("server rejected connection (session table full)");
        }

        Ok(Self {
            req_path,
            resp_path,
            notif_path,
            notif_file,
        })
    }

    /// Clone a handle to the notification pipe, for a reader thread to poll.
    pub fn open_notifications(&self) -> Result<std::fs::File> {
        self.notif_file.try_clone().context("clone notification handle")
    }

    pub fn disconnect(self) -> Result<u8> {
        self.send_and_ack(&Request::encode_disconnect(), OpCode::DISCONNECT)
    }

    pub fn subscribe(&self, key: &str) -> Result<u8> {
        let frame = Request::encode_subscribe(key)?;
        self.send_and_ack(&frame, OpCode::SUBSCRIBE)
    }

    pub fn unsubscribe(&self, key: &str) -> Result<u8> {
        let frame = Request::encode_unsubscribe(key)?;
        self.send_and_ack(&frame, OpCode::UNSUBSCRIBE)
    }

    fn send_and_ack(&self, frame: &[u8], expected_opcode: u8) -> Result<u8> {
        let mut req = open_write_blocking(&self.req_path).context("opening request pipe")?;
        req.write_all(frame)?;
        drop(req);

        let mut resp = open_read_blocking(&self.resp_path).context("opening response pipe")?;
        let mut buf = [0u8; RESPONSE_FRAME_LEN];
        resp.read_exact(&mut buf)?;
        let ack = Response::decode(&buf)?;
        if ack.opcode != expected_opcode {
            warn!(
                "client: expected ack for opcode {expected_opcode}, got {}",
                ack.opcode
            );
        }
        Ok(ack.result)
    }
}

/// Drain `notif_pipe` forever, printing each record as it arrives. Intended
/// to run on its own thread; a non-blocking pipe means this loop must poll.
pub fn notification_loop(mut notif_pipe: std::fs::File) {
    let mut buf = [0u8; 256];
    loop {
        match notif_pipe.read(&mut buf) {
            Ok(0) => std::thread::sleep(std::time::Duration::from_millis(20)),
            Ok(n) => {
                print!("{}", String::from_utf8_lossy(&buf[..n]));
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(std::time::Duration::from_millis(20));
            }
            Err(e) => {
                warn!("client: notification pipe read failed: {e:#}");
                break;
            }
        }
    }
}
