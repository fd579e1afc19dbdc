//! DNS message construction on top of `hickory-proto`.

use std::net::Ipv4Addr;

use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};

/// TTL of synthesized answers, in seconds.
pub const SENTINEL_TTL: u32 = 600;

/// Build a recursive query for a single question, with a random ID.
pub fn forward_query(name: Name, record_type: RecordType) -> Message {
    let mut message = Message::new();
    message
        .set_id(rand::random())
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .add_query(Query::query(name, record_type));
    message
}

/// The A record handed out for intercepted names.
pub fn sentinel_record(name: Name, addr: Ipv4Addr) -> Record {
    Record::from_rdata(name, SENTINEL_TTL, RData::A(A(addr)))
}

/// Start a reply to `request`.
///
/// Keeps the ID, opcode and RD/CD bits, and echoes the first question.
/// The answer section is left for the caller to fill.
pub fn reply_to(request: &Message) -> Message {
    let mut reply = Message::new();
    reply
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(request.op_code())
        .set_recursion_desired(request.recursion_desired())
        .set_checking_disabled(request.checking_disabled())
        .set_authoritative(false)
        .set_response_code(ResponseCode::NoError);
    if let Some(query) = request.queries().first() {
        reply.add_query(query.clone());
    }
    reply
}

/// Lowercased ASCII form of a name without the trailing root dot.
pub fn normalize(name: &Name) -> String {
    let ascii = name.to_ascii();
    ascii.trim_end_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn forward_query_sets_recursion_desired() {
        let name = Name::from_str("openai.com.").unwrap();
        let query = forward_query(name.clone(), RecordType::MX);

        assert!(query.recursion_desired());
        assert_eq!(query.message_type(), MessageType::Query);
        assert_eq!(query.queries().len(), 1);
        assert_eq!(query.queries()[0].name(), &name);
        assert_eq!(query.queries()[0].query_type(), RecordType::MX);
    }

    #[test]
    fn sentinel_record_is_a_with_fixed_ttl() {
        let name = Name::from_str("example.com.").unwrap();
        let record = sentinel_record(name.clone(), Ipv4Addr::new(8, 8, 8, 255));

        assert_eq!(record.name(), &name);
        assert_eq!(record.record_type(), RecordType::A);
        assert_eq!(record.ttl(), 600);
        assert_eq!(record.data(), Some(&RData::A(A(Ipv4Addr::new(8, 8, 8, 255)))));
    }

    #[test]
    fn reply_to_mirrors_request_header() {
        let mut request = forward_query(Name::from_str("a.example.com.").unwrap(), RecordType::A);
        request.add_query(Query::query(
            Name::from_str("b.example.com.").unwrap(),
            RecordType::A,
        ));

        let reply = reply_to(&request);

        assert_eq!(reply.id(), request.id());
        assert_eq!(reply.message_type(), MessageType::Response);
        assert!(reply.recursion_desired());
        assert!(!reply.authoritative());
        assert_eq!(reply.response_code(), ResponseCode::NoError);
        assert_eq!(reply.queries(), &request.queries()[..1]);
        assert!(reply.answers().is_empty());
    }

    #[test]
    fn normalize_strips_root_and_lowercases() {
        let name = Name::from_str("WWW.Example.COM.").unwrap();

        assert_eq!(normalize(&name), "www.example.com");
        assert_eq!(normalize(&Name::from_str("localhost").unwrap()), "localhost");
    }
}
