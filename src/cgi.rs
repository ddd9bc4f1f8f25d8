//! CGI front end for the chart tools data source protocol.
//!
//! The request arrives in `QUERY_STRING` as `tq=<query>&tqx=<key:value;...>`.
//! The reply is a header block followed by the body in the requested output
//! format.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::info;

use crate::db::Response;
use crate::export::{to_csv, to_html, to_json, to_tsv, OutputFormat};

pub const DEFAULT_RESPONSE_HANDLER: &str = "google.visualization.Query.setResponse";

/// Bytes kept as-is in header file names.
const FILENAME_SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'_').remove(b'-');

/// Decoded request parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CgiRequest {
    pub query: String,
    pub req_id: String,
    pub version: String,
    /// `json` (default), `csv`, `tsv-excel` or `html`.
    pub out: String,
    /// Accepted but not checked.
    pub sig: String,
    pub response_handler: String,
    pub out_file_name: String,
}

/// `+` is a space, `%xx` an escaped byte.
pub fn decode_component(text: &str) -> String {
    let spaced = text.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

impl CgiRequest {
    pub fn parse(query_string: &str) -> Self {
        let mut req = CgiRequest::default();
        for part in query_string.split('&') {
            if let Some(tqx) = part.strip_prefix("tqx=") {
                req.parse_tqx(&decode_component(tqx));
            } else if let Some(tq) = part.strip_prefix("tq=") {
                req.query = decode_component(tq);
            }
        }
        req
    }

    fn parse_tqx(&mut self, tqx: &str) {
        for pair in tqx.split(';') {
            let Some((key, value)) = pair.split_once(':') else {
                continue;
            };
            let value = value.to_string();
            match key {
                "reqId" => self.req_id = value,
                "version" => self.version = value,
                "out" => self.out = value,
                "sig" => self.sig = value,
                "responseHandler" => self.response_handler = value,
                "outFileName" => self.out_file_name = value,
                _ => {}
            }
        }
    }

    /// Unknown `out` values fall back to JSON.
    pub fn format(&self) -> OutputFormat {
        self.out.parse().unwrap_or_default()
    }
}

fn attachment(name: &str) -> String {
    let encoded = utf8_percent_encode(name, FILENAME_SAFE).to_string();
    format!(
        "Content-Disposition: attachment; filename=\"{}\"; filename*=UTF-8''{}\r\n",
        encoded, encoded
    )
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

/// Build the full CGI reply (headers and body) for `response`.
///
/// `title` names the HTML page. The numeric `reqId` is echoed in JSON
/// replies; a missing or non-numeric one is reported as `0`.
pub fn render(req: &CgiRequest, response: Response, title: &str) -> Vec<u8> {
    let mut out = String::new();
    out.push_str("Cache-Control: no-cache, no-store, max-age=0, must-revalidate\r\n");
    out.push_str("X-Content-Type-Options: nosniff\r\n");
    out.push_str("X-Robots-Tag: noindex, nofollow, nosnippet\r\n");

    let format = req.format();
    info!(%format, req_id = %req.req_id, ok = response.is_ok(), "cgi reply");
    match format {
        OutputFormat::Html => {
            out.push_str("Content-type: text/html; charset=utf-8\r\n\r\n");
            out.push_str(&to_html(&response, title));
            out.into_bytes()
        }
        OutputFormat::Tsv => {
            out.push_str(&attachment(or_default(&req.out_file_name, "data.tsv")));
            out.push_str("Content-Type: text/tab-separated-values; charset=utf-16\r\n\r\n");
            let mut bytes = out.into_bytes();
            bytes.extend(to_tsv(&response));
            bytes
        }
        OutputFormat::Csv => {
            out.push_str(&attachment(or_default(&req.out_file_name, "data.csv")));
            out.push_str("Content-type: text/csv; charset=utf-8\r\n\r\n");
            out.push_str(&to_csv(&response));
            out.into_bytes()
        }
        OutputFormat::Json => {
            let req_id = req.req_id.trim().parse::<i64>().unwrap_or(0);
            let response = response.with_req_id(Some(req_id));
            out.push_str(&attachment(or_default(&req.out_file_name, "json.txt")));
            out.push_str("Content-type: application/javascript; charset=utf-8\r\n\r\n");
            out.push_str("/*O_o*/\n");
            out.push_str(or_default(&req.response_handler, DEFAULT_RESPONSE_HANDLER));
            out.push('(');
            out.push_str(&to_json(&response));
            out.push_str(");");
            out.into_bytes()
        }
    }
}
