//! Black-box wire protocol tests: a real loopback `TcpStream` pair standing
//! in for the agent/controller connection, exercising framing, the message
//! envelope, and the memory-dump formatter end to end.

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::thread;

use ldb_wire::memdump::{self, Provider, ProviderStep};
use ldb_wire::message::{self, AgentMessage};
use ldb_wire::value::{Number, WireValue};

fn loopback_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
    let addr = listener.local_addr().unwrap();
    let client = thread::spawn(move || TcpStream::connect(addr).unwrap());
    let (server, _) = listener.accept().unwrap();
    (server, client.join().unwrap())
}

#[test]
fn break_message_survives_a_real_socket_round_trip() {
    let (mut server, mut client) = loopback_pair();

    let br = AgentMessage::Break {
        basename: "game.lua".to_string(),
        line: 42,
        pid: 1234,
        fullpath: "/srv/game.lua".to_string(),
    };
    message::write_frame(&mut server, &br.encode()).unwrap();

    let payload = message::read_frame(&mut client).unwrap();
    assert_eq!(AgentMessage::parse(&payload).unwrap(), br);
}

#[test]
fn a_full_command_response_exchange_round_trips() {
    let (mut agent, mut controller) = loopback_pair();

    let cmd = message::join(&["sb".to_string(), "game.lua".to_string(), "10".to_string()]);
    message::write_frame(&mut controller, cmd.as_bytes()).unwrap();

    let payload = message::read_frame(&mut agent).unwrap();
    let tokens = message::tokenize(std::str::from_utf8(&payload).unwrap()).unwrap();
    assert_eq!(tokens, vec!["sb", "game.lua", "10"]);

    message::write_frame(&mut agent, &AgentMessage::Ok(String::new()).encode()).unwrap();
    let payload = message::read_frame(&mut controller).unwrap();
    assert_eq!(AgentMessage::parse(&payload).unwrap(), AgentMessage::Ok(String::new()));
}

#[test]
fn memory_dump_header_then_raw_bytes_bypasses_nul_framing() {
    let (mut agent, mut controller) = loopback_pair();

    let bytes = vec![0xde, 0xad, 0xbe, 0xef, 0x00, 0x01];
    let header = AgentMessage::Ok(format!("{:08x}", bytes.len()));
    message::write_frame(&mut agent, &header.encode()).unwrap();
    agent.write_all(&bytes).unwrap();

    let payload = message::read_frame(&mut controller).unwrap();
    let AgentMessage::Ok(body) = AgentMessage::parse(&payload).unwrap() else {
        panic!("expected OK header");
    };
    let len = usize::from_str_radix(&body, 16).unwrap();
    assert_eq!(len, bytes.len());

    let mut received = vec![0u8; len];
    std::io::Read::read_exact(&mut controller, &mut received).unwrap();
    assert_eq!(received, bytes);
}

#[test]
fn typed_values_round_trip_through_their_wire_encoding() {
    let values = vec![
        WireValue::Nil,
        WireValue::Bool(true),
        WireValue::Number(Number::Int(-7)),
        WireValue::Number(Number::Float(3.5)),
        WireValue::Table(0x1000),
        WireValue::Function(0x2000),
    ];
    for v in values {
        let encoded = v.encode();
        assert_eq!(WireValue::decode(&encoded).unwrap(), v);
    }
}

#[test]
fn memory_dump_rows_match_the_provider_byte_stream() {
    let mut chunks = vec![vec![1u8, 2, 3, 4], vec![5, 6]].into_iter();
    let mut provider: Box<dyn Provider> = Box::new(move || match chunks.next() {
        Some(c) => ProviderStep::Chunk(c),
        None => ProviderStep::End,
    });
    let mut out = Vec::new();
    memdump::dump(0x10, 6, provider.as_mut(), &mut out, None, None).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), memdump::expected_row_count(0x10, 6));
    assert!(text.starts_with("0x10:"));
}
