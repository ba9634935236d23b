use bytes::{Bytes, BytesMut};
use pingora::{http::RequestHeader, protocols::http::ServerSession};
use pingora_error::Result;

/// Extracts the value of a specific query parameter from a raw query string.
///
/// Returns the first occurrence of the parameter's value.
pub fn get_query_value<'a>(query: Option<&'a str>, name: &str) -> Option<&'a str> {
    query.and_then(|query| {
        query.split('&').find_map(|pair| match pair.split_once('=') {
            Some((k, v)) if k == name => Some(v.trim()),
            None if pair == name => Some(""),
            _ => None,
        })
    })
}

/// Removes a query parameter, returning `None` when nothing is left.
pub fn remove_query(query: &str, name: &str) -> Option<String> {
    let kept: Vec<&str> = query
        .split('&')
        .filter(|item| {
            let key = item.split_once('=').map_or(*item, |(k, _)| k);
            !item.is_empty() && key != name
        })
        .collect();
    (!kept.is_empty()).then(|| kept.join("&"))
}

/// Retrieves the value of a specific header from the request.
///
/// Returns `None` if the header is not present or its value is not valid UTF-8.
pub fn get_req_header_value<'a>(req_header: &'a RequestHeader, key: &str) -> Option<&'a str> {
    req_header
        .headers
        .get(key)
        .and_then(|value| value.to_str().ok())
}

/// Reads the whole request body.
pub async fn read_request_body(http_session: &mut ServerSession) -> Result<Bytes> {
    let mut body = BytesMut::new();
    while let Some(bytes) = http_session.read_request_body().await? {
        body.extend_from_slice(&bytes);
    }
    Ok(body.freeze())
}
