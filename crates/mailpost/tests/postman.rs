//! Integration tests for the postman.
//!
//! These tests use a recording transport that logs every call it receives,
//! so connection lifecycle and delivery can be checked without a relay.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use mailpost::mime::{Address, Enclosure, Envelope, headers};
use mailpost::{
    Error, Login, Options, Postman, Rejection, Rejections, StartTls, Transport, TransportFactory,
    factory_fn, middleware,
};

const HOST: &str = "host";
const PORT: u16 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Connect { host: String, port: u16 },
    SetDebugLevel(u8),
    Ehlo,
    StartTls,
    Login { username: String, password: String },
    SendMail { sender: String, receivers: Vec<String>, body: Vec<u8> },
    Quit,
}

/// Calls tagged with the id of the transport that received them.
type Log = Arc<Mutex<Vec<(usize, Call)>>>;

#[derive(Debug)]
struct MockError(&'static str);

impl fmt::Display for MockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for MockError {}

/// How the mock relay behaves.
#[derive(Debug, Clone, Default)]
struct Script {
    refuse_connect: bool,
    refuse_ehlo: bool,
    rejected: Rejections,
    extensions: Vec<&'static str>,
}

#[derive(Debug)]
struct MockTransport {
    id: usize,
    log: Log,
    script: Script,
}

impl MockTransport {
    fn record(&self, call: Call) {
        self.log.lock().unwrap().push((self.id, call));
    }
}

impl Transport for MockTransport {
    type Error = MockError;

    fn set_debug_level(&mut self, level: u8) {
        self.record(Call::SetDebugLevel(level));
    }

    fn ehlo(&mut self) -> Result<(), MockError> {
        self.record(Call::Ehlo);
        if self.script.refuse_ehlo {
            return Err(MockError("ehlo refused"));
        }
        Ok(())
    }

    fn send_mail(
        &mut self,
        sender: &str,
        receivers: &[String],
        body: &[u8],
    ) -> Result<Rejections, MockError> {
        self.record(Call::SendMail {
            sender: sender.to_string(),
            receivers: receivers.to_vec(),
            body: body.to_vec(),
        });
        Ok(self.script.rejected.clone())
    }

    fn quit(&mut self) -> Result<(), MockError> {
        self.record(Call::Quit);
        Ok(())
    }
}

impl StartTls for MockTransport {
    fn has_extension(&self, name: &str) -> bool {
        self.script.extensions.iter().any(|ext| ext.eq_ignore_ascii_case(name))
    }

    fn starttls(&mut self) -> Result<(), MockError> {
        self.record(Call::StartTls);
        Ok(())
    }
}

impl Login for MockTransport {
    fn login(&mut self, username: &str, password: &str) -> Result<(), MockError> {
        self.record(Call::Login {
            username: username.to_string(),
            password: password.to_string(),
        });
        Ok(())
    }
}

#[derive(Debug)]
struct MockRelay {
    log: Log,
    script: Script,
    next_id: AtomicUsize,
}

impl MockRelay {
    fn new(script: Script) -> Self {
        Self {
            log: Log::default(),
            script,
            next_id: AtomicUsize::new(0),
        }
    }
}

impl TransportFactory for MockRelay {
    type Transport = MockTransport;

    fn connect(&self, host: &str, port: u16, _options: &Options) -> Result<MockTransport, MockError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push((
            id,
            Call::Connect {
                host: host.to_string(),
                port,
            },
        ));
        if self.script.refuse_connect {
            return Err(MockError("connection refused"));
        }
        Ok(MockTransport {
            id,
            log: Arc::clone(&self.log),
            script: self.script.clone(),
        })
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn postman_with(script: Script, options: Options) -> (Postman<MockRelay>, Log) {
    init_tracing();
    let relay = MockRelay::new(script);
    let log = Arc::clone(&relay.log);
    (Postman::with_transport(HOST, PORT, options, relay), log)
}

fn postman() -> (Postman<MockRelay>, Log) {
    postman_with(Script::default(), Options::new())
}

fn calls(log: &Log) -> Vec<Call> {
    log.lock().unwrap().iter().map(|(_, call)| call.clone()).collect()
}

fn count(log: &Log, wanted: &Call) -> usize {
    calls(log).iter().filter(|call| *call == wanted).count()
}

fn connect_call() -> Call {
    Call::Connect {
        host: HOST.to_string(),
        port: PORT,
    }
}

fn envelope() -> Envelope {
    Envelope::new(
        vec![
            headers::sender("Me <me@mail.com>"),
            headers::to(["him@mail.com"]),
            headers::subject("subject"),
        ],
        vec![Enclosure::plain_text("Hi!")],
    )
}

/// Replaces the random multipart boundary so two renderings compare equal.
fn normalize(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body).into_owned();
    let Some(start) = text.find("boundary=\"").map(|i| i + "boundary=\"".len()) else {
        return text;
    };
    let end = start + text[start..].find('"').unwrap();
    let boundary = text[start..end].to_string();
    text.replace(&boundary, "BOUNDARY")
}

#[test]
fn test_connection_handshakes_then_closes_on_drop() {
    let (postman, log) = postman();

    {
        let _conn = postman.connection().unwrap();
        assert_eq!(calls(&log), [connect_call(), Call::Ehlo]);
    }

    assert_eq!(calls(&log), [connect_call(), Call::Ehlo, Call::Quit]);
}

#[test]
fn test_connection_closed_once_when_scope_errors() {
    let (postman, log) = postman();

    let result: mailpost::Result<()> = (|| {
        let _conn = postman.connection()?;
        Err(Error::Config("caller failed".into()))
    })();

    assert!(result.is_err());
    assert_eq!(count(&log, &Call::Quit), 1);
}

#[test]
fn test_connection_closed_once_when_scope_panics() {
    let (postman, log) = postman();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let _conn = postman.connection().unwrap();
        panic!("caller panicked");
    }));

    assert!(outcome.is_err());
    assert_eq!(count(&log, &Call::Quit), 1);
}

#[test]
fn test_explicit_close_does_not_quit_twice() {
    let (postman, log) = postman();

    let conn = postman.connection().unwrap();
    conn.close().unwrap();

    assert_eq!(count(&log, &Call::Quit), 1);
}

#[test]
fn test_deliver_without_failures() {
    let (postman, _log) = postman();

    let mut conn = postman.connection().unwrap();
    let response = postman.deliver(&mut conn, &envelope()).unwrap();

    assert!(response.ok());
    assert!(response.rejected().is_empty());
}

#[test]
fn test_deliver_with_failures() {
    let script = Script {
        rejected: Rejections::from([("addr".to_string(), Rejection::new(255, "reason"))]),
        ..Script::default()
    };
    let (postman, _log) = postman_with(script, Options::new());

    let mut conn = postman.connection().unwrap();
    let response = postman.deliver(&mut conn, &envelope()).unwrap();

    assert!(!response.ok());
    assert_eq!(
        response.rejected(),
        &Rejections::from([("addr".to_string(), Rejection::new(255, "reason"))])
    );
}

#[test]
fn test_deliver_passes_sender_receivers_and_body() {
    let (postman, log) = postman();
    let envelope = envelope();

    let mut conn = postman.connection().unwrap();
    postman.deliver(&mut conn, &envelope).unwrap();
    drop(conn);

    let sent = calls(&log)
        .into_iter()
        .find_map(|call| match call {
            Call::SendMail {
                sender,
                receivers,
                body,
            } => Some((sender, receivers, body)),
            _ => None,
        })
        .unwrap();

    let expected_receivers: Vec<String> = envelope
        .receivers()
        .unwrap()
        .iter()
        .map(Address::encode)
        .collect();
    assert_eq!(sent.0, envelope.sender().unwrap().encode());
    assert_eq!(sent.0, "me@mail.com");
    assert_eq!(sent.1, expected_receivers);
    assert_eq!(normalize(&sent.2), normalize(&envelope.string()));
    assert!(calls(&log).contains(&Call::Ehlo));
}

#[test]
fn test_send_uses_one_connection_and_one_delivery() {
    let (postman, log) = postman();

    let response = postman.send(&envelope()).unwrap();
    assert!(response.ok());

    let calls = calls(&log);
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[0], connect_call());
    assert_eq!(calls[1], Call::Ehlo);
    assert!(matches!(calls[2], Call::SendMail { .. }));
    assert_eq!(calls[3], Call::Quit);
}

#[test]
fn test_send_without_sender_still_closes() {
    let (postman, log) = postman();
    let envelope = Envelope::new(vec![headers::to(["him@mail.com"])], Vec::new());

    let err = postman.send(&envelope).unwrap_err();

    assert!(matches!(err, Error::Envelope(_)));
    assert!(!calls(&log).iter().any(|call| matches!(call, Call::SendMail { .. })));
    assert_eq!(count(&log, &Call::Quit), 1);
}

#[test]
fn test_send_with_no_receivers_reaches_transport() {
    let (postman, log) = postman();
    let envelope = Envelope::new(vec![headers::from("me@mail.com")], Vec::new());

    postman.send(&envelope).unwrap();

    assert!(calls(&log).iter().any(|call| matches!(
        call,
        Call::SendMail { receivers, .. } if receivers.is_empty()
    )));
}

#[test]
fn test_middleware_runs_once_before_yield() {
    let (mut postman, log) = postman();
    let seen: Arc<Mutex<Vec<(usize, Vec<Call>)>>> = Arc::default();

    let seen_by_middleware = Arc::clone(&seen);
    let log_for_middleware = Arc::clone(&log);
    postman.use_middleware(move |conn: &mut MockTransport| {
        let so_far: Vec<Call> = log_for_middleware
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == conn.id)
            .map(|(_, call)| call.clone())
            .collect();
        seen_by_middleware.lock().unwrap().push((conn.id, so_far));
        Ok(None)
    });

    let first = postman.connection().unwrap();
    let second = postman.connection().unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        [
            (first.id, vec![connect_call(), Call::Ehlo]),
            (second.id, vec![connect_call(), Call::Ehlo]),
        ]
    );
}

#[test]
fn test_middleware_can_replace_connection() {
    let (mut postman, log) = postman();

    let log_for_replacement = Arc::clone(&log);
    postman.use_middleware(move |conn: &mut MockTransport| {
        Ok(Some(MockTransport {
            id: 99,
            log: Arc::clone(&log_for_replacement),
            script: conn.script.clone(),
        }))
    });

    {
        let conn = postman.connection().unwrap();
        assert_eq!(conn.id, 99);
        assert_eq!(log.lock().unwrap().last(), Some(&(0, Call::Quit)));
    }

    assert_eq!(log.lock().unwrap().last(), Some(&(99, Call::Quit)));
    assert_eq!(count(&log, &Call::Quit), 2);
}

#[test]
fn test_middleware_error_aborts_and_closes() {
    let (mut postman, log) = postman();
    let later_ran = Arc::new(AtomicUsize::new(0));

    postman.use_middleware(|_: &mut MockTransport| Err(Error::Middleware("nope".into())));
    let later = Arc::clone(&later_ran);
    postman.use_middleware(move |_: &mut MockTransport| {
        later.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    });

    let err = postman.connection().unwrap_err();

    assert!(matches!(err, Error::Middleware(ref msg) if msg == "nope"));
    assert_eq!(later_ran.load(Ordering::SeqCst), 0);
    assert_eq!(count(&log, &Call::Quit), 1);
}

#[test]
fn test_debug_level_set_before_ehlo() {
    let (postman, log) = postman_with(Script::default(), Options::new().with_debug_level(1));

    drop(postman.connection().unwrap());

    assert_eq!(
        calls(&log),
        [connect_call(), Call::SetDebugLevel(1), Call::Ehlo, Call::Quit]
    );
}

#[test]
fn test_no_debug_level_by_default() {
    let (postman, log) = postman();

    drop(postman.connection().unwrap());

    assert!(!calls(&log).iter().any(|call| matches!(call, Call::SetDebugLevel(_))));
}

#[test]
fn test_connect_failure() {
    let script = Script {
        refuse_connect: true,
        ..Script::default()
    };
    let (postman, log) = postman_with(script, Options::new());

    let err = postman.connection().unwrap_err();

    match &err {
        Error::Connect { host, port, .. } => {
            assert_eq!(host, HOST);
            assert_eq!(*port, PORT);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.transport_error::<MockError>().unwrap().0, "connection refused");
    assert_eq!(calls(&log), [connect_call()]);
}

#[test]
fn test_handshake_failure_still_closes() {
    let script = Script {
        refuse_ehlo: true,
        ..Script::default()
    };
    let (postman, log) = postman_with(script, Options::new());

    let err = postman.connection().unwrap_err();

    assert!(matches!(err, Error::Transport(_)));
    assert_eq!(calls(&log), [connect_call(), Call::Ehlo, Call::Quit]);
}

#[test]
fn test_tls_middleware_only_when_advertised() {
    let (mut postman, log) = postman();
    postman.use_middleware(middleware::tls(false));

    drop(postman.connection().unwrap());
    assert_eq!(count(&log, &Call::StartTls), 0);

    let script = Script {
        extensions: vec!["STARTTLS"],
        ..Script::default()
    };
    let (mut postman, log) = postman_with(script, Options::new());
    postman.use_middleware(middleware::tls(false));

    drop(postman.connection().unwrap());
    assert_eq!(
        calls(&log),
        [connect_call(), Call::Ehlo, Call::StartTls, Call::Ehlo, Call::Quit]
    );
}

#[test]
fn test_forced_tls_and_auth_middleware() {
    let (mut postman, log) = postman();
    postman.use_middleware(middleware::tls(true));
    postman.use_middleware(middleware::auth("me", "secret"));

    drop(postman.connection().unwrap());

    assert_eq!(
        calls(&log),
        [
            connect_call(),
            Call::Ehlo,
            Call::StartTls,
            Call::Ehlo,
            Call::Login {
                username: "me".into(),
                password: "secret".into(),
            },
            Call::Quit,
        ]
    );
}

#[test]
fn test_builder_with_closure_factory() {
    init_tracing();
    let log = Log::default();
    let factory_log = Arc::clone(&log);
    let factory = factory_fn(move |host: &str, port: u16, _: &Options| {
        factory_log.lock().unwrap().push((
            7,
            Call::Connect {
                host: host.to_string(),
                port,
            },
        ));
        Ok::<_, MockError>(MockTransport {
            id: 7,
            log: Arc::clone(&factory_log),
            script: Script::default(),
        })
    });

    let postman = Postman::builder(HOST, PORT, factory)
        .debug_level(2)
        .middleware(middleware::from_fn(|_: &mut MockTransport| Ok(None)))
        .build();
    assert_eq!(postman.middleware_count(), 1);

    postman.send(&envelope()).unwrap();

    let calls = calls(&log);
    assert_eq!(calls[..3], [connect_call(), Call::SetDebugLevel(2), Call::Ehlo]);
    assert_eq!(calls.last(), Some(&Call::Quit));
}
