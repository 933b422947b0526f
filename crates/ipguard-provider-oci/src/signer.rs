//! OCI HTTP request signing
//!
//! Implements the OCI flavour of draft-cavage HTTP Signatures (version 1,
//! `rsa-sha256`). Every request signs `date (request-target) host`; requests
//! with a body additionally sign `x-content-sha256 content-type content-length`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{
    AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, DATE, HOST, HeaderMap, HeaderName, HeaderValue,
};
use reqwest::{Method, Url};
use ring::digest::{SHA256, digest};
use ring::rand::SystemRandom;
use ring::signature::{RSA_PKCS1_SHA256, RsaKeyPair};
use rustls_pemfile::Item;

use ipguard_core::{Error, Result};

const CONTENT_SHA256: &str = "x-content-sha256";
const JSON: &str = "application/json";

/// DER body of a PEM private key, by encoding
enum PemKey {
    Pkcs8(Vec<u8>),
    Pkcs1(Vec<u8>),
}

/// Signs requests with an account's API key
pub struct RequestSigner {
    key_id: String,
    key_pair: RsaKeyPair,
    rng: SystemRandom,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("key_id", &"<REDACTED>")
            .field("key_pair", &"<REDACTED>")
            .finish()
    }
}

impl RequestSigner {
    /// Create a signer from an unencrypted PEM private key
    ///
    /// Accepts PKCS#8 (`BEGIN PRIVATE KEY`) and PKCS#1 (`BEGIN RSA PRIVATE KEY`).
    pub fn from_pem(key_id: impl Into<String>, pem: &str) -> Result<Self> {
        let key_pair = match decode_pem(pem)? {
            PemKey::Pkcs8(der) => RsaKeyPair::from_pkcs8(&der),
            PemKey::Pkcs1(der) => RsaKeyPair::from_der(&der),
        }
        .map_err(|e| Error::auth(format!("Invalid RSA private key: {}", e)))?;

        Ok(Self {
            key_id: key_id.into(),
            key_pair,
            rng: SystemRandom::new(),
        })
    }

    /// Headers to attach to a request, `Authorization` included
    ///
    /// `date` is an RFC 7231 date (`Thu, 05 Jan 2014 21:31:40 GMT`).
    pub fn sign(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&[u8]>,
        date: &str,
    ) -> Result<HeaderMap> {
        let host = host_header(url)?;
        let target = request_target(method, url);

        let mut headers = HeaderMap::new();
        headers.insert(DATE, header_value(date)?);
        headers.insert(HOST, header_value(&host)?);

        let mut names = vec!["date", "(request-target)", "host"];
        let mut lines = vec![
            format!("date: {}", date),
            format!("(request-target): {}", target),
            format!("host: {}", host),
        ];

        if let Some(body) = body {
            let sha = STANDARD.encode(digest(&SHA256, body));
            let length = body.len().to_string();

            headers.insert(HeaderName::from_static(CONTENT_SHA256), header_value(&sha)?);
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
            headers.insert(CONTENT_LENGTH, header_value(&length)?);

            names.extend([CONTENT_SHA256, "content-type", "content-length"]);
            lines.push(format!("{}: {}", CONTENT_SHA256, sha));
            lines.push(format!("content-type: {}", JSON));
            lines.push(format!("content-length: {}", length));
        }

        let signature = self.signature(&lines.join("\n"))?;
        let authorization = format!(
            "Signature version=\"1\",keyId=\"{}\",algorithm=\"rsa-sha256\",headers=\"{}\",signature=\"{}\"",
            self.key_id,
            names.join(" "),
            signature
        );
        headers.insert(AUTHORIZATION, header_value(&authorization)?);

        Ok(headers)
    }

    fn signature(&self, signing_string: &str) -> Result<String> {
        let mut signature = vec![0; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(
                &RSA_PKCS1_SHA256,
                &self.rng,
                signing_string.as_bytes(),
                &mut signature,
            )
            .map_err(|_| Error::auth("Failed to sign request"))?;
        Ok(STANDARD.encode(signature))
    }
}

/// `<lowercase method> <path>[?<query>]`
fn request_target(method: &Method, url: &Url) -> String {
    let mut target = format!("{} {}", method.as_str().to_lowercase(), url.path());
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    target
}

/// Host as sent on the wire: port only when not the scheme default
fn host_header(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::invalid_input(format!("URL has no host: {}", url)))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::invalid_input(format!("Invalid header value: {}", e)))
}

/// Read the first private key item of a PEM document
fn decode_pem(pem: &str) -> Result<PemKey> {
    // Neither encrypted PKCS#8 nor legacy Proc-Type PKCS#1 can be used unattended
    let encrypted = pem.lines().map(str::trim).any(|line| {
        line.starts_with("-----BEGIN ENCRYPTED") || line.starts_with("Proc-Type: 4,ENCRYPTED")
    });
    if encrypted {
        return Err(Error::auth("Encrypted private keys are not supported"));
    }

    let mut reader = pem.as_bytes();
    loop {
        match rustls_pemfile::read_one(&mut reader) {
            Ok(Some(Item::Pkcs8Key(key))) => {
                return Ok(PemKey::Pkcs8(key.secret_pkcs8_der().to_vec()));
            }
            Ok(Some(Item::Pkcs1Key(key))) => {
                return Ok(PemKey::Pkcs1(key.secret_pkcs1_der().to_vec()));
            }
            Ok(Some(Item::Sec1Key(_))) => {
                return Err(Error::auth("EC private keys are not supported, use an RSA API key"));
            }
            Ok(Some(_)) => continue,
            Ok(None) => return Err(Error::auth("No private key found in PEM document")),
            Err(e) => return Err(Error::auth(format!("Invalid private key PEM: {}", e))),
        }
    }
}
