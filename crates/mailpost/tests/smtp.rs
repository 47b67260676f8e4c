//! End-to-end delivery through the SMTP transport.
//!
//! A scripted relay on a loopback socket records every line the postman's
//! client sends.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use mailpost::mime::{Enclosure, Envelope, headers};
use mailpost::{Error, Options, Postman, middleware};

/// Relay that accepts everything except recipients starting with `bad`.
fn spawn_relay() -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (socket, _) = listener.accept().unwrap();
        let mut writer = socket.try_clone().unwrap();
        let mut reader = BufReader::new(socket);
        let mut transcript = Vec::new();

        writer.write_all(b"220 relay.test ESMTP\r\n").unwrap();

        let mut in_data = false;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap() == 0 {
                break;
            }
            let line = line.trim_end_matches(['\r', '\n']).to_string();
            transcript.push(line.clone());

            if in_data {
                if line == "." {
                    in_data = false;
                    writer.write_all(b"250 2.0.0 queued\r\n").unwrap();
                }
                continue;
            }

            let reply: &[u8] = if line.starts_with("EHLO") {
                b"250-relay.test\r\n250-SIZE 1048576\r\n250 AUTH PLAIN\r\n"
            } else if line.starts_with("RCPT TO:<bad") {
                b"550 5.1.1 No such user\r\n"
            } else if line.starts_with("AUTH PLAIN") {
                b"235 2.7.0 Authentication successful\r\n"
            } else if line == "DATA" {
                in_data = true;
                b"354 Go ahead\r\n"
            } else if line == "QUIT" {
                writer.write_all(b"221 2.0.0 Bye\r\n").unwrap();
                break;
            } else {
                b"250 2.0.0 OK\r\n"
            };
            writer.write_all(reply).unwrap();
        }

        transcript
    });

    (port, handle)
}

fn envelope() -> Envelope {
    Envelope::new(
        vec![
            headers::from("Me <me@example.com>"),
            headers::to(["you@example.com", "bad@example.com"]),
            headers::subject("Hello"),
        ],
        vec![Enclosure::plain_text("Hi there")],
    )
}

#[test]
fn test_send_over_smtp() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let (port, relay) = spawn_relay();

    let options = Options::new()
        .with_debug_level(1)
        .with("local_hostname", "client.test")
        .with("timeout_secs", 5);
    let mut postman = Postman::with_options("127.0.0.1", port, options);
    postman.use_middleware(middleware::auth("user", "pass"));

    let response = postman.send(&envelope()).unwrap();

    assert!(!response.ok());
    assert!(!response.is_rejected("you@example.com"));
    assert_eq!(response.rejection("bad@example.com").unwrap().code, 550);

    let transcript = relay.join().unwrap();

    assert_eq!(transcript[0], "EHLO client.test");
    assert!(transcript.contains(&"AUTH PLAIN AHVzZXIAcGFzcw==".to_string()));
    assert!(
        transcript
            .iter()
            .any(|line| line.starts_with("MAIL FROM:<me@example.com>"))
    );
    assert!(transcript.contains(&"RCPT TO:<you@example.com>".to_string()));
    assert!(transcript.contains(&"RCPT TO:<bad@example.com>".to_string()));
    assert!(transcript.contains(&"From: Me <me@example.com>".to_string()));
    assert!(transcript.contains(&"Subject: Hello".to_string()));
    assert_eq!(transcript.iter().filter(|line| *line == "QUIT").count(), 1);
    assert_eq!(transcript.last().map(String::as_str), Some("QUIT"));
}

#[test]
fn test_invalid_smtp_options_fail_connect() {
    let options = Options::new().with("security", "carrier-pigeon");
    let postman = Postman::with_options("127.0.0.1", 25, options);

    let err = postman.send(&envelope()).unwrap_err();

    assert!(matches!(err, Error::Connect { port: 25, .. }));
    assert!(matches!(
        err.transport_error::<mailpost_smtp::Error>(),
        Some(mailpost_smtp::Error::InvalidConfig(_))
    ));
}
