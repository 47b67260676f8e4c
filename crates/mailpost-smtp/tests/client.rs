//! Integration tests for the SMTP client.
//!
//! These tests run a scripted SMTP server on a loopback socket and record
//! every line the client sends.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use mailpost_smtp::{Client, ClientConfig, Error};

const EHLO_REPLY: &str = "250-mx.test greets you\r\n250-SIZE 10240\r\n250-8BITMIME\r\n250 AUTH PLAIN LOGIN\r\n";

/// Canned replies for the fake server.
#[derive(Clone, Copy)]
struct Script {
    greeting: &'static str,
    ehlo: &'static str,
    mail_from: &'static str,
    data: &'static str,
    end_of_data: &'static str,
}

const ESMTP: Script = Script {
    greeting: "220 mx.test ESMTP\r\n",
    ehlo: EHLO_REPLY,
    mail_from: "250 2.1.0 OK\r\n",
    data: "354 End data with <CR><LF>.<CR><LF>\r\n",
    end_of_data: "250 2.0.0 queued\r\n",
};

/// Fake server. Recipients starting with `bad` are refused with 550.
fn spawn_server(script: Script) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (socket, _) = listener.accept().unwrap();
        let mut writer = socket.try_clone().unwrap();
        let mut reader = BufReader::new(socket);
        let mut transcript = Vec::new();

        writer.write_all(script.greeting.as_bytes()).unwrap();
        if !script.greeting.starts_with("220") {
            return transcript;
        }

        let mut in_data = false;
        let mut login_prompts = 0;
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
                    writer.write_all(script.end_of_data.as_bytes()).unwrap();
                }
                continue;
            }

            let reply: &str = if login_prompts == 2 {
                login_prompts = 1;
                "334 UGFzc3dvcmQ6\r\n"
            } else if login_prompts == 1 {
                login_prompts = 0;
                "235 2.7.0 Authentication successful\r\n"
            } else if line.starts_with("EHLO") {
                script.ehlo
            } else if line.starts_with("MAIL FROM") {
                script.mail_from
            } else if line.starts_with("RCPT TO:<bad") {
                "550 5.1.1 No such user\r\n"
            } else if line == "DATA" {
                in_data = script.data.starts_with("354");
                script.data
            } else if line.starts_with("AUTH PLAIN") {
                "235 2.7.0 Authentication successful\r\n"
            } else if line == "AUTH LOGIN" {
                login_prompts = 2;
                "334 VXNlcm5hbWU6\r\n"
            } else if line == "QUIT" {
                writer.write_all(b"221 2.0.0 Bye\r\n").unwrap();
                break;
            } else {
                "250 2.0.0 OK\r\n"
            };
            writer.write_all(reply.as_bytes()).unwrap();
        }

        transcript
    });

    (port, handle)
}

fn config() -> ClientConfig {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    ClientConfig::default().with_local_hostname("client.test")
}

fn recipients(list: &[&str]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

#[test]
fn test_send_mail_reports_refused_recipients() {
    let (port, server) = spawn_server(ESMTP);
    let mut client = Client::connect("127.0.0.1", port, config()).unwrap();

    let refused = client
        .send_mail(
            "sender@example.com",
            &recipients(&["good@example.com", "bad@example.com"]),
            b"Subject: hi\n\n.dot line\nend\n",
        )
        .unwrap();

    assert_eq!(refused.len(), 1);
    let reply = &refused["bad@example.com"];
    assert_eq!(reply.code.as_u16(), 550);
    assert_eq!(reply.message_text(), "5.1.1 No such user");

    client.quit().unwrap();
    let transcript = server.join().unwrap();

    assert_eq!(transcript[0], "EHLO client.test");
    assert!(transcript[1].starts_with("MAIL FROM:<sender@example.com> SIZE="));
    assert_eq!(transcript[2], "RCPT TO:<good@example.com>");
    assert_eq!(transcript[3], "RCPT TO:<bad@example.com>");
    assert_eq!(transcript[4], "DATA");
    assert_eq!(&transcript[5..10], ["Subject: hi", "", "..dot line", "end", "."]);
    assert_eq!(transcript[10], "QUIT");
}

#[test]
fn test_all_recipients_refused_resets_without_data() {
    let (port, server) = spawn_server(ESMTP);
    let mut client = Client::connect("127.0.0.1", port, config()).unwrap();

    let refused = client
        .send_mail(
            "sender@example.com",
            &recipients(&["bad1@example.com", "bad2@example.com"]),
            b"Subject: hi\r\n\r\nbody\r\n",
        )
        .unwrap();

    assert_eq!(refused.len(), 2);
    assert!(refused.values().all(|reply| reply.code.as_u16() == 550));

    client.quit().unwrap();
    let transcript = server.join().unwrap();

    assert!(transcript.contains(&"RSET".to_string()));
    assert!(!transcript.contains(&"DATA".to_string()));
}

#[test]
fn test_sender_refused() {
    let (port, server) = spawn_server(Script {
        mail_from: "553 5.7.1 Sender address rejected\r\n",
        ..ESMTP
    });
    let mut client = Client::connect("127.0.0.1", port, config()).unwrap();

    let err = client
        .send_mail("spoof@example.com", &recipients(&["good@example.com"]), b"body\r\n")
        .unwrap_err();

    match &err {
        Error::SenderRefused { code, sender, message } => {
            assert_eq!(*code, 553);
            assert_eq!(sender, "spoof@example.com");
            assert_eq!(message, "5.7.1 Sender address rejected");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_permanent());

    client.quit().unwrap();
    let transcript = server.join().unwrap();

    assert_eq!(transcript[2], "RSET");
    assert!(!transcript.iter().any(|line| line.starts_with("RCPT")));
}

#[test]
fn test_data_command_refused() {
    let (port, server) = spawn_server(Script {
        data: "451 4.3.0 Try again later\r\n",
        ..ESMTP
    });
    let mut client = Client::connect("127.0.0.1", port, config()).unwrap();

    let err = client
        .send_mail("sender@example.com", &recipients(&["good@example.com"]), b"body\r\n")
        .unwrap_err();

    assert!(matches!(err, Error::DataRefused { code: 451, .. }));
    assert!(err.is_transient());

    client.quit().unwrap();
    let transcript = server.join().unwrap();
    assert_eq!(&transcript[3..], ["DATA", "RSET", "QUIT"]);
}

#[test]
fn test_message_refused_after_data() {
    let (port, server) = spawn_server(Script {
        end_of_data: "554 5.6.0 Message rejected as spam\r\n",
        ..ESMTP
    });
    let mut client = Client::connect("127.0.0.1", port, config()).unwrap();

    let err = client
        .send_mail("sender@example.com", &recipients(&["good@example.com"]), b"body\r\n")
        .unwrap_err();

    match err {
        Error::DataRefused { code, message } => {
            assert_eq!(code, 554);
            assert_eq!(message, "5.6.0 Message rejected as spam");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    client.quit().unwrap();
    let transcript = server.join().unwrap();
    assert_eq!(&transcript[transcript.len() - 3..], ["body", ".", "QUIT"]);
}

#[test]
fn test_line_breaks_in_addresses_never_reach_the_server() {
    let (port, server) = spawn_server(ESMTP);
    let mut client = Client::connect("127.0.0.1", port, config()).unwrap();

    let err = client
        .send_mail(
            "sender@example.com",
            &recipients(&["x@y.z>\r\nRCPT TO:<evil@y.z"]),
            b"body\r\n",
        )
        .unwrap_err();
    assert!(matches!(err, Error::InvalidAddress(_)));

    let err = client
        .send_mail("a@b.c>\r\nRSET", &recipients(&["good@example.com"]), b"body\r\n")
        .unwrap_err();
    assert!(matches!(err, Error::InvalidAddress(_)));

    // The session is still in step with the server.
    let refused = client
        .send_mail("sender@example.com", &recipients(&["good@example.com"]), b"body\r\n")
        .unwrap();
    assert!(refused.is_empty());

    client.quit().unwrap();
    let transcript = server.join().unwrap();
    assert!(!transcript.iter().any(|line| line.contains("evil")));
    assert_eq!(
        transcript.iter().filter(|line| line.starts_with("RCPT")).count(),
        1
    );
}

#[test]
fn test_falls_back_to_helo() {
    let (port, server) = spawn_server(Script {
        ehlo: "502 5.5.1 Command not implemented\r\n",
        ..ESMTP
    });
    let mut client = Client::connect("127.0.0.1", port, config()).unwrap();

    let refused = client
        .send_mail("sender@example.com", &recipients(&["good@example.com"]), b"body\r\n")
        .unwrap();
    assert!(refused.is_empty());
    assert!(client.extensions().is_none());
    assert!(!client.has_extension("SIZE"));

    client.quit().unwrap();
    let transcript = server.join().unwrap();

    assert_eq!(transcript[0], "EHLO client.test");
    assert_eq!(transcript[1], "HELO client.test");
    assert_eq!(transcript[2], "MAIL FROM:<sender@example.com>");
}

#[test]
fn test_login_prefers_plain() {
    let (port, server) = spawn_server(ESMTP);
    let mut client = Client::connect("127.0.0.1", port, config()).unwrap();

    client.ehlo().unwrap();
    assert!(client.has_extension("auth"));
    assert_eq!(client.extensions().unwrap().max_size(), Some(10240));

    client.login("user", "pass").unwrap();
    client.quit().unwrap();

    let transcript = server.join().unwrap();
    // base64("\0user\0pass")
    assert_eq!(transcript[1], "AUTH PLAIN AHVzZXIAcGFzcw==");
}

#[test]
fn test_login_answers_challenges() {
    let (port, server) = spawn_server(Script {
        ehlo: "250-mx.test greets you\r\n250 AUTH LOGIN\r\n",
        ..ESMTP
    });
    let mut client = Client::connect("127.0.0.1", port, config()).unwrap();

    client.login("user", "pass").unwrap();
    client.quit().unwrap();

    let transcript = server.join().unwrap();
    assert_eq!(
        transcript,
        ["EHLO client.test", "AUTH LOGIN", "dXNlcg==", "cGFzcw==", "QUIT"]
    );
}

#[test]
fn test_quit_closes_session() {
    let (port, server) = spawn_server(ESMTP);
    let mut client = Client::connect("127.0.0.1", port, config()).unwrap();

    client.quit().unwrap();
    assert!(client.is_closed());
    client.quit().unwrap();
    assert!(matches!(client.noop(), Err(Error::ConnectionClosed)));

    let transcript = server.join().unwrap();
    assert_eq!(transcript, vec!["QUIT".to_string()]);
}

#[test]
fn test_greeting_refused() {
    let (port, server) = spawn_server(Script {
        greeting: "554 5.3.2 Not accepting mail\r\n",
        ..ESMTP
    });
    let err = Client::connect("127.0.0.1", port, config()).unwrap_err();

    assert_eq!(err.code(), Some(554));
    assert!(err.is_permanent());
    server.join().unwrap();
}
