use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use crate::config::HsmConfig;

use super::response::sign_pdf_envelope;
use super::{OtpSessionRequest, SignPdfRequest, SignerError, SigningService};

/// HTTP client for the HSM OTP gateway and the emSigner PDF signing service.
#[derive(Debug, Clone)]
pub struct HsmClient {
    client: Client,
    otp_base_url: String,
    sign_base_url: String,
}

#[derive(Debug, Serialize)]
struct GenOtpBody<'a> {
    otptype: &'static str,
    ptno: &'static str,
    txn: &'a str,
    klabel: &'a str,
}

impl HsmClient {
    pub fn new(config: &HsmConfig) -> Result<Self, SignerError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.timeout)
            .build()
            .map_err(|error| SignerError::Configuration(error.to_string()))?;
        Ok(Self {
            client,
            otp_base_url: config.otp_base_url.clone(),
            sign_base_url: config.sign_base_url.clone(),
        })
    }

    fn endpoint(base: &str, path: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), path)
    }

    async fn read_body(response: reqwest::Response) -> Result<String, SignerError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SignerError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

impl SigningService for HsmClient {
    async fn generate_otp(&self, request: &OtpSessionRequest) -> Result<String, SignerError> {
        let response = self
            .client
            .post(Self::endpoint(&self.otp_base_url, "HSM/GenOtp"))
            .json(&GenOtpBody {
                otptype: "single",
                ptno: "1",
                txn: &request.transaction_id,
                klabel: &request.key_label,
            })
            .send()
            .await?;
        Self::read_body(response).await
    }

    async fn sign_pdf(&self, request: &SignPdfRequest) -> Result<String, SignerError> {
        let response = self
            .client
            .post(Self::endpoint(&self.sign_base_url, "services/dsverifyWS"))
            .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(sign_pdf_envelope(request))
            .send()
            .await?;
        Self::read_body(response).await
    }
}
