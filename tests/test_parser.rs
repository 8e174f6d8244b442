use proptest::prelude::*;
use tierserve::http::parser::{
    ParseError, ParseState, ParseStatus, RequestParser, normalize_target, parse_http_request,
};
use tierserve::http::request::{Method, Request};

fn parse_in_chunks(raw: &[u8], chunk: usize) -> (Request, usize) {
    let mut parser = RequestParser::new("judge.html", 1024 * 1024);
    let mut end = 0;
    loop {
        end = (end + chunk).min(raw.len());
        match parser.advance(&raw[..end]).unwrap() {
            ParseStatus::Complete { request, consumed } => return (request, consumed),
            ParseStatus::Incomplete => assert!(end < raw.len(), "parser stalled on a full request"),
        }
    }
}

#[test]
fn test_parse_simple_get_request() {
    let req = b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let (parsed, consumed) = parse_http_request(req).unwrap();

    assert_eq!(parsed.method, Method::GET);
    assert_eq!(parsed.path, "/index.html");
    assert_eq!(parsed.version, "HTTP/1.1");
    assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_root_resolves_to_default_document() {
    let req = b"GET / HTTP/1.1\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();
    assert_eq!(parsed.path, "/judge.html");

    let mut parser = RequestParser::new("home.html", 1024);
    match parser.advance(req).unwrap() {
        ParseStatus::Complete { request, .. } => assert_eq!(request.path, "/home.html"),
        ParseStatus::Incomplete => panic!("expected a complete request"),
    }
}

#[test]
fn test_parse_post_request_with_body() {
    let req = b"POST /upload HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello";
    let (parsed, consumed) = parse_http_request(req).unwrap();

    assert_eq!(parsed.method, Method::POST);
    assert_eq!(parsed.path, "/upload");
    assert_eq!(parsed.body, b"hello".to_vec());
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_query_string_is_dropped() {
    let req = b"GET /search.html?q=rust HTTP/1.1\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();
    assert_eq!(parsed.path, "/search.html");
}

#[test]
fn test_parse_absolute_form_target() {
    let req = b"GET http://example.com:8080/a/b.html HTTP/1.1\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();
    assert_eq!(parsed.path, "/a/b.html");

    assert_eq!(normalize_target("HTTPS://host/", "judge.html").unwrap(), "/judge.html");
    assert_eq!(normalize_target("http://host", "judge.html"), Err(ParseError::InvalidTarget));
    assert_eq!(normalize_target("relative", "judge.html"), Err(ParseError::InvalidTarget));
}

#[test]
fn test_parse_method_is_case_insensitive() {
    let (parsed, _) = parse_http_request(b"post /x HTTP/1.1\r\n\r\n").unwrap();
    assert_eq!(parsed.method, Method::POST);
}

#[test]
fn test_parse_tabs_and_space_runs_in_request_line() {
    let (parsed, _) = parse_http_request(b"GET \t /x.html\t HTTP/1.1\r\n\r\n").unwrap();
    assert_eq!(parsed.path, "/x.html");
}

#[test]
fn test_parse_incomplete_request_missing_blank_line() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n";
    assert!(matches!(parse_http_request(req), Err(ParseError::Incomplete)));
}

#[test]
fn test_parse_incomplete_request_partial_body() {
    let req = b"POST /api HTTP/1.1\r\nContent-Length: 10\r\n\r\nhello";
    assert!(matches!(parse_http_request(req), Err(ParseError::Incomplete)));
}

#[test]
fn test_parse_invalid_http_method() {
    let req = b"DELETE / HTTP/1.1\r\n\r\n";
    assert!(matches!(parse_http_request(req), Err(ParseError::InvalidMethod)));
}

#[test]
fn test_parse_unsupported_version() {
    let req = b"GET / HTTP/1.0\r\n\r\n";
    assert!(matches!(parse_http_request(req), Err(ParseError::UnsupportedVersion)));
}

#[test]
fn test_parse_request_line_without_version() {
    let req = b"GET\r\n\r\n";
    assert!(matches!(parse_http_request(req), Err(ParseError::InvalidRequest)));
}

#[test]
fn test_parse_bare_lf_is_malformed() {
    let req = b"GET / HTTP/1.1\nHost: x\n\n";
    assert!(matches!(parse_http_request(req), Err(ParseError::MalformedLine)));
}

#[test]
fn test_parse_unknown_header_line_is_ignored() {
    let req = b"GET /a.html HTTP/1.1\r\nBrokenHeader\r\nHost: h\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();

    assert_eq!(parsed.headers.len(), 1);
    assert_eq!(parsed.header("Host"), Some("h"));
}

#[test]
fn test_parse_non_numeric_content_length() {
    let req = b"POST /upload HTTP/1.1\r\nContent-Length: ten\r\n\r\n";
    assert!(matches!(parse_http_request(req), Err(ParseError::InvalidContentLength)));
}

#[test]
fn test_parse_header_values_are_trimmed() {
    let req = b"GET /a HTTP/1.1\r\nConnection: \t keep-alive \t\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();
    assert!(parsed.keep_alive());
}

#[test]
fn test_parse_request_with_binary_body() {
    let req = b"POST /upload HTTP/1.1\r\nContent-Length: 4\r\n\r\n\x00\x01\x02\x03";
    let (parsed, _) = parse_http_request(req).unwrap();
    assert_eq!(parsed.body, vec![0, 1, 2, 3]);
}

#[test]
fn test_parse_oversized_header_block() {
    let mut req = b"GET / HTTP/1.1\r\nX-Filler: ".to_vec();
    req.extend(std::iter::repeat_n(b'a', 70 * 1024));
    assert!(matches!(parse_http_request(&req), Err(ParseError::TooLarge)));
}

#[test]
fn test_parse_pipelined_requests_report_consumed() {
    let raw = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";
    let mut parser = RequestParser::new("judge.html", 1024);

    let consumed = match parser.advance(raw).unwrap() {
        ParseStatus::Complete { request, consumed } => {
            assert_eq!(request.path, "/a");
            consumed
        }
        ParseStatus::Incomplete => panic!("expected first request"),
    };
    assert_eq!(parser.state(), ParseState::RequestLine);

    match parser.advance(&raw[consumed..]).unwrap() {
        ParseStatus::Complete { request, .. } => assert_eq!(request.path, "/b"),
        ParseStatus::Incomplete => panic!("expected second request"),
    }
}

#[test]
fn test_parse_body_spread_across_reads() {
    let raw = b"POST /upload HTTP/1.1\r\nContent-Length: 11\r\n\r\nhello world";
    let (parsed, consumed) = parse_in_chunks(raw, 3);
    assert_eq!(parsed.body, b"hello world".to_vec());
    assert_eq!(consumed, raw.len());
}

fn request_strategy() -> impl Strategy<Value = Vec<u8>> {
    (
        prop_oneof![Just("GET"), Just("POST"), Just("get")],
        "/[a-z0-9]{0,12}(\\.html)?",
        proptest::collection::vec(("[A-Za-z][A-Za-z-]{0,10}", "[ -~]{0,20}"), 0..5),
        proptest::collection::vec(any::<u8>(), 0..64),
    )
        .prop_map(|(method, path, headers, body)| {
            let mut raw = format!("{method} {path} HTTP/1.1\r\n");
            for (k, v) in headers {
                if k.eq_ignore_ascii_case("Content-Length") {
                    continue;
                }
                raw.push_str(&format!("{k}: {v}\r\n"));
            }
            raw.push_str(&format!("Content-Length: {}\r\n\r\n", body.len()));
            let mut raw = raw.into_bytes();
            raw.extend_from_slice(&body);
            raw
        })
}

proptest! {
    #[test]
    fn prop_chunk_size_does_not_change_result(raw in request_strategy(), chunk in 1usize..32) {
        let (whole, whole_consumed) = parse_in_chunks(&raw, raw.len());
        let (pieces, pieces_consumed) = parse_in_chunks(&raw, chunk);

        prop_assert_eq!(whole.method, pieces.method);
        prop_assert_eq!(whole.path, pieces.path);
        prop_assert_eq!(whole.headers, pieces.headers);
        prop_assert_eq!(whole.body, pieces.body);
        prop_assert_eq!(whole_consumed, pieces_consumed);
        prop_assert_eq!(whole_consumed, raw.len());
    }
}
