use crate::error::ProbeError;

/// Builds the raw `sendTransaction` request written to the socket.
///
/// The transaction payload is spliced into the JSON-RPC envelope as-is: it
/// is neither escaped nor checked, so a malformed payload yields a
/// malformed body with a correct `Content-Length`. Only the request line
/// and headers are checked for structural problems.
#[derive(Debug, Clone)]
pub struct RequestBuilder<'a> {
    host: &'a str,
    token: &'a str,
    transaction: &'a str,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(host: &'a str) -> Self {
        Self {
            host,
            token: "",
            transaction: "",
        }
    }

    pub fn token(mut self, token: &'a str) -> Self {
        self.token = token;
        self
    }

    pub fn transaction(mut self, transaction: &'a str) -> Self {
        self.transaction = transaction;
        self
    }

    pub fn build(&self) -> Result<RawRequest, ProbeError> {
        if self.host.is_empty() || self.host.contains(['\r', '\n']) {
            return Err(ProbeError::MalformedRequest(format!(
                "invalid Host header value {:?}",
                self.host
            )));
        }
        if self
            .token
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(ProbeError::MalformedRequest(format!(
                "path token {:?} contains whitespace or control characters",
                self.token
            )));
        }

        let path = format!("/{}", self.token);
        let body = format!(
            r#"{{"jsonrpc":"2.0","id":1,"method":"sendTransaction","params":["{}",{{"skipPreflight":true,"encoding":"base64"}}]}}"#,
            self.transaction
        );

        let mut head = String::with_capacity(128 + self.host.len() + path.len());
        head.push_str(&format!("POST {} HTTP/1.1\r\n", path));
        head.push_str(&format!("Host: {}\r\n", self.host));
        head.push_str("Content-Type: application/json\r\n");
        head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        head.push_str("Connection: close\r\n");
        head.push_str("\r\n");

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(body.as_bytes());

        Ok(RawRequest {
            path,
            host: self.host.to_string(),
            body,
            bytes,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest {
    path: String,
    host: String,
    body: String,
    bytes: Vec<u8>,
}

impl RawRequest {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Byte length of the body, as announced in `Content-Length`.
    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}
