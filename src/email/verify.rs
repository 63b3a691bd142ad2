// src/email/verify.rs
use std::time::Duration;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::config::EmailConfig;
use crate::error::{FinderResult, FinderError};
use crate::utils::http::HttpClient;

const MX_RECORD_TYPE: u16 = 15;

/// Mail deliverability checks used to score generated addresses
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailVerifier: Send + Sync {
    /// Whether the domain publishes at least one MX record
    async fn check_mx(&self, domain: &str) -> bool;

    /// Whether the domain's primary mail exchanger accepts the recipient
    async fn smtp_check(&self, email: &str) -> bool;
}

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: u32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

/// Resolves MX records over DNS-over-HTTPS and probes SMTP directly
pub struct DnsMailVerifier {
    client: HttpClient,
    doh_url: String,
    smtp: SmtpProbe,
}

impl DnsMailVerifier {
    pub fn new(client: HttpClient, doh_url: impl Into<String>, smtp: SmtpProbe) -> Self {
        Self {
            client,
            doh_url: doh_url.into(),
            smtp,
        }
    }

    pub fn from_config(config: &EmailConfig, client: HttpClient) -> Self {
        Self::new(client, config.doh_url.clone(), SmtpProbe::from_config(config))
    }

    /// Mail exchangers for a domain ordered by preference
    pub async fn mx_hosts(&self, domain: &str) -> FinderResult<Vec<(u16, String)>> {
        let url = format!(
            "{}?name={}&type=MX",
            self.doh_url,
            url::form_urlencoded::byte_serialize(domain.as_bytes()).collect::<String>()
        );
        let response = self
            .client
            .get_with_headers(&url, &[("accept", "application/dns-json")])
            .await?
            .error_for_status()?;
        let body: DohResponse = response.json().await?;

        if body.status != 0 {
            debug!("DNS status {} for {}", body.status, domain);
            return Ok(Vec::new());
        }

        let mut hosts: Vec<(u16, String)> = body
            .answer
            .iter()
            .filter(|a| a.record_type == MX_RECORD_TYPE)
            .filter_map(|a| parse_mx_data(&a.data))
            .collect();
        hosts.sort_by_key(|(preference, _)| *preference);

        Ok(hosts)
    }
}

fn parse_mx_data(data: &str) -> Option<(u16, String)> {
    let mut parts = data.split_whitespace();
    let preference = parts.next()?.parse().ok()?;
    let host = parts.next()?.trim_end_matches('.').to_string();
    if host.is_empty() {
        return None;
    }
    Some((preference, host))
}

#[async_trait]
impl MailVerifier for DnsMailVerifier {
    async fn check_mx(&self, domain: &str) -> bool {
        match self.mx_hosts(domain).await {
            Ok(hosts) => !hosts.is_empty(),
            Err(e) => {
                debug!("MX lookup failed for {}: {}", domain, e);
                false
            }
        }
    }

    async fn smtp_check(&self, email: &str) -> bool {
        let Some((_, domain)) = email.rsplit_once('@') else {
            return false;
        };

        let host = match self.mx_hosts(domain).await {
            Ok(hosts) => match hosts.into_iter().next() {
                Some((_, host)) => host,
                None => return false,
            },
            Err(e) => {
                debug!("MX lookup failed for {}: {}", domain, e);
                return false;
            }
        };

        match self.smtp.probe(&host, email).await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("SMTP probe of {} via {} failed: {}", email, host, e);
                false
            }
        }
    }
}

/// Minimal SMTP dialogue that asks a server whether it accepts a recipient
#[derive(Debug, Clone)]
pub struct SmtpProbe {
    port: u16,
    timeout: Duration,
    helo_domain: String,
}

impl SmtpProbe {
    pub fn new(port: u16, timeout: Duration, helo_domain: impl Into<String>) -> Self {
        Self {
            port,
            timeout,
            helo_domain: helo_domain.into(),
        }
    }

    pub fn from_config(config: &EmailConfig) -> Self {
        Self::new(
            config.smtp_port,
            Duration::from_secs(config.smtp_timeout_seconds),
            config.helo_domain.clone(),
        )
    }

    /// Run HELO / MAIL FROM / RCPT TO and report whether RCPT got 250 or 251
    pub async fn probe(&self, host: &str, email: &str) -> FinderResult<bool> {
        match tokio::time::timeout(self.timeout, self.dialogue(host, email)).await {
            Ok(result) => result,
            Err(_) => Err(FinderError::TimeoutError {
                operation: format!("SMTP probe of {}", host),
                seconds: self.timeout.as_secs(),
            }),
        }
    }

    async fn dialogue(&self, host: &str, email: &str) -> FinderResult<bool> {
        let stream = TcpStream::connect((host, self.port))
            .await
            .map_err(|e| FinderError::NetworkError(format!("Failed to connect to {}:{}: {}", host, self.port, e)))?;
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        expect_class(read_reply(&mut reader).await?, 2, "greeting")?;

        send(&mut writer, &format!("HELO {}", self.helo_domain)).await?;
        expect_class(read_reply(&mut reader).await?, 2, "HELO")?;

        send(&mut writer, "MAIL FROM:<>").await?;
        expect_class(read_reply(&mut reader).await?, 2, "MAIL FROM")?;

        send(&mut writer, &format!("RCPT TO:<{}>", email)).await?;
        let code = read_reply(&mut reader).await?;
        debug!("RCPT {} -> {}", email, code);

        // Best effort, the answer is already known
        let _ = send(&mut writer, "QUIT").await;

        Ok(code == 250 || code == 251)
    }
}

async fn send<W: AsyncWriteExt + Unpin>(writer: &mut W, command: &str) -> FinderResult<()> {
    writer
        .write_all(format!("{}\r\n", command).as_bytes())
        .await
        .map_err(|e| FinderError::SmtpError(format!("Failed to send {}: {}", command, e)))
}

/// Read a possibly multi-line reply and return its status code
async fn read_reply<R: AsyncBufReadExt + Unpin>(reader: &mut R) -> FinderResult<u16> {
    loop {
        let mut line = String::new();
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| FinderError::SmtpError(format!("Failed to read reply: {}", e)))?;
        if read == 0 {
            return Err(FinderError::SmtpError("Connection closed by server".to_string()));
        }

        let line = line.trim_end();
        let code = line
            .get(..3)
            .and_then(|c| c.parse::<u16>().ok())
            .ok_or_else(|| FinderError::SmtpError(format!("Malformed reply: {:?}", line)))?;

        // "250-..." continues, "250 ..." or a bare "250" ends the reply
        if line.as_bytes().get(3) != Some(&b'-') {
            return Ok(code);
        }
    }
}

fn expect_class(code: u16, class: u16, stage: &str) -> FinderResult<()> {
    if code / 100 == class {
        Ok(())
    } else {
        Err(FinderError::SmtpError(format!("Unexpected {} reply {}", stage, code)))
    }
}
