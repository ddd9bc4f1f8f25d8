//! Response serializers: wire JSON, CSV, TSV (UTF-16) and HTML.

use std::fmt;
use std::str::FromStr;

use crate::db::Response;
use crate::error::GqlError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
    Tsv,
    Html,
}

impl OutputFormat {
    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Html => "html",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = GqlError;

    /// Accepts the `out` values of the request protocol, including
    /// `tsv-excel`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "tsv" | "tsv-excel" => Ok(OutputFormat::Tsv),
            "html" => Ok(OutputFormat::Html),
            other => Err(GqlError::new(
                crate::error::Reason::NotSupported,
                format!("unsupported format '{}'", other),
            )),
        }
    }
}

pub fn to_json(response: &Response) -> String {
    serde_json::to_string(response).unwrap_or_else(|_| "{}".to_string())
}

pub fn to_csv(response: &Response) -> String {
    let mut output = String::new();

    if !response.errors.is_empty() {
        for e in &response.errors {
            output.push_str(&csv_quote(e.reason.as_str()));
            output.push(',');
            output.push_str(&csv_quote(&e.message));
            output.push('\n');
        }
        return output;
    }

    let Some(table) = &response.table else {
        return output;
    };

    let headers: Vec<String> = table.cols.iter().map(|c| csv_quote(c.title())).collect();
    output.push_str(&headers.join(","));
    output.push('\n');

    for row in &table.rows {
        let cells: Vec<String> = row.c.iter().map(|c| csv_quote(&c.text())).collect();
        output.push_str(&cells.join(","));
        output.push('\n');
    }

    output
}

/// Tab separated values, UTF-16BE with a byte order mark.
pub fn to_tsv(response: &Response) -> Vec<u8> {
    let mut text = String::new();

    for e in &response.errors {
        text.push_str(e.reason.as_str());
        text.push('\t');
        text.push_str(&e.message);
        text.push('\n');
    }

    if let Some(table) = &response.table {
        let headers: Vec<String> = table.cols.iter().map(|c| tsv_field(c.title())).collect();
        text.push_str(&headers.join("\t"));
        text.push('\n');

        for row in &table.rows {
            let cells: Vec<String> = row.c.iter().map(|c| tsv_field(&c.text())).collect();
            text.push_str(&cells.join("\t"));
            text.push('\n');
        }
    }

    let mut output = vec![0xfe, 0xff];
    for unit in text.encode_utf16() {
        output.extend_from_slice(&unit.to_be_bytes());
    }
    output
}

pub fn to_html(response: &Response, title: &str) -> String {
    let mut o = String::new();
    o.push_str("<!DOCTYPE html PUBLIC \"-//W3C//DTD HTML 4.01//EN\">\n");
    o.push_str("<html>\n<head>\n");
    o.push_str("<META http-equiv=\"Content-Type\" content=\"text/html; charset=UTF-8\">\n");
    o.push_str(&format!("<title>{}</title>\n", html_escape(title)));
    o.push_str("</head>\n<body>\n");

    if !response.errors.is_empty() {
        for e in &response.errors {
            o.push_str(&format!(
                "<h1 color='#f00'>{}: {}</h1></body>\n",
                html_escape(e.reason.as_str()),
                html_escape(&e.message)
            ));
        }
        return o;
    }

    o.push_str("<table border=\"1\" cellpadding=\"2\" cellspacing=\"0\">\n");
    o.push_str("<tr style=\"font-weight: bold; background-color: #aaa;\">\n");
    if let Some(table) = &response.table {
        for col in &table.cols {
            o.push_str(&format!("<td>{}</td>", html_escape(col.title())));
        }
        o.push_str("\n</tr>\n");

        const ROW_COLORS: [&str; 2] = ["#f0f0f0", "#ffffff"];
        for (i, row) in table.rows.iter().enumerate() {
            o.push_str(&format!(
                "<tr style=\"background-color: {}\">\n",
                ROW_COLORS[i % 2]
            ));
            for cell in &row.c {
                o.push_str(&format!("<td>{}</td>", html_escape(&cell.text())));
            }
            o.push_str("\n</tr>\n");
        }
    } else {
        o.push_str("\n</tr>\n");
    }
    o.push_str("</table>\n</body>\n</html>\n");
    o
}

/// Always quoted, embedded quotes doubled.
fn csv_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn tsv_field(s: &str) -> String {
    s.replace('\t', "")
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}
