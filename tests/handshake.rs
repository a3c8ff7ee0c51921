use hmac::{Hmac, Mac};
use qdbfront::rpc::auth::{self, AuthError, CHALLENGE, DIGEST_TAG, FAILURE, WELCOME};
use qdbfront::rpc::{Connection, ConnectionError, FrameReader, FrameWriter, Listener};
use sha2::Sha256;
use std::io::ErrorKind;
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

const SECRET: &[u8] = b"secret password";

fn raw_client(listener: &Listener) -> (FrameReader<TcpStream>, FrameWriter<TcpStream>) {
    let stream = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(3)))
        .unwrap();
    (
        FrameReader::new(stream.try_clone().unwrap()),
        FrameWriter::new(stream),
    )
}

fn digest(secret: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).unwrap();
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

#[test]
fn test_wrong_secret_gets_failure_and_close() {
    let listener = Listener::bind("127.0.0.1:0", SECRET).unwrap();
    let (mut reader, mut writer) = raw_client(&listener);
    let agent = thread::spawn(move || listener.accept().err());

    let challenge = reader.recv_bytes().unwrap();
    let nonce = challenge.strip_prefix(CHALLENGE).unwrap();
    assert!(nonce.starts_with(DIGEST_TAG));
    assert_eq!(nonce.len(), DIGEST_TAG.len() + auth::NONCE_LEN);

    let response = [DIGEST_TAG, &digest(b"wrong", nonce)[..]].concat();
    writer.send_bytes(&response).unwrap();
    assert_eq!(reader.recv_bytes().unwrap(), FAILURE);

    let err = reader.recv_bytes().unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset
    ));
    assert!(matches!(
        agent.join().unwrap(),
        Some(ConnectionError::Auth(AuthError::WrongDigest))
    ));
}

#[test]
fn test_correct_secret_gets_welcome() {
    let listener = Listener::bind("127.0.0.1:0", SECRET).unwrap();
    let (mut reader, mut writer) = raw_client(&listener);
    let agent = thread::spawn(move || listener.accept().map(|conn| (listener, conn)));

    let challenge = reader.recv_bytes().unwrap();
    let nonce = challenge.strip_prefix(CHALLENGE).unwrap();
    let response = [DIGEST_TAG, &digest(SECRET, nonce)[..]].concat();
    writer.send_bytes(&response).unwrap();
    assert_eq!(reader.recv_bytes().unwrap(), WELCOME);

    // mutual part: the agent answers our challenge
    auth::deliver_challenge(&mut reader, &mut writer, SECRET).unwrap();

    let (_listener, mut conn) = agent.join().unwrap().unwrap();
    writer.send_bytes(b"ping").unwrap();
    assert_eq!(conn.recv_bytes().unwrap(), b"ping");
    conn.send_bytes(b"pong").unwrap();
    assert_eq!(reader.recv_bytes().unwrap(), b"pong");
}

#[test]
fn test_untagged_digest_accepted() {
    let listener = Listener::bind("127.0.0.1:0", SECRET).unwrap();
    let (mut reader, mut writer) = raw_client(&listener);
    let agent = thread::spawn(move || listener.accept().is_ok());

    let challenge = reader.recv_bytes().unwrap();
    let nonce = challenge.strip_prefix(CHALLENGE).unwrap();
    writer.send_bytes(&digest(SECRET, nonce)).unwrap();
    assert_eq!(reader.recv_bytes().unwrap(), WELCOME);

    auth::deliver_challenge(&mut reader, &mut writer, SECRET).unwrap();
    assert!(agent.join().unwrap());
}

#[test]
fn test_client_rejected_by_agent() {
    let listener = Listener::bind("127.0.0.1:0", b"agent secret").unwrap();
    let addr = listener.local_addr().unwrap();
    let agent = thread::spawn(move || listener.accept().is_err());

    let err = Connection::connect(addr, SECRET).err().unwrap();
    assert!(matches!(err, ConnectionError::Auth(AuthError::Rejected)));
    assert!(!err.is_unreachable());
    assert!(agent.join().unwrap());
}

#[test]
fn test_connection_traffic_and_poll() {
    let listener = Listener::bind("127.0.0.1:0", SECRET).unwrap();
    let addr = listener.local_addr().unwrap();
    let agent = thread::spawn(move || listener.accept().unwrap());

    let mut client = Connection::connect(addr, SECRET).unwrap();
    let mut agent = agent.join().unwrap();
    assert_eq!(client.peer_addr(), addr);

    assert!(!client.poll().unwrap());
    let big = vec![7u8; 100_000];
    agent.send_bytes(&big).unwrap();
    assert!(wait_readable(&client));
    assert_eq!(client.recv_bytes().unwrap(), big);
    assert!(!client.poll().unwrap());

    agent.close();
    assert!(wait_readable(&client));
    assert_eq!(
        client.recv_bytes().unwrap_err().kind(),
        ErrorKind::UnexpectedEof
    );
}

fn wait_readable(conn: &Connection) -> bool {
    (0..1000).any(|_| {
        if conn.poll().unwrap() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
        false
    })
}

#[test]
fn test_unreachable_agent() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let err = Connection::connect(("127.0.0.1", port), SECRET)
        .err()
        .unwrap();
    assert!(err.is_unreachable());
}
