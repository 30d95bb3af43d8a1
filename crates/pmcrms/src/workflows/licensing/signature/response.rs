//! Wire format of the emSigner SOAP endpoint.
//!
//! The signer answers with `<return>{txn}~SUCCESS~{base64 pdf}</return>` on success and
//! embeds `{txn}~FAILURE~failure` when the OTP or key is rejected. Everything else is
//! treated as malformed.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::SignPdfRequest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignOutcome {
    Signed(Vec<u8>),
    Rejected,
    Malformed(String),
}

pub fn parse_sign_response(transaction_id: &str, raw: &str) -> SignOutcome {
    if raw.contains(&format!("{transaction_id}~FAILURE~failure")) {
        return SignOutcome::Rejected;
    }

    let marker = format!("<return>{transaction_id}~SUCCESS~");
    let Some(start) = raw.find(&marker).map(|index| index + marker.len()) else {
        return SignOutcome::Malformed("success marker missing".to_string());
    };
    let Some(length) = raw[start..].find("</return>") else {
        return SignOutcome::Malformed("unterminated return element".to_string());
    };

    let payload: String = raw[start..start + length]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if payload.is_empty() {
        return SignOutcome::Malformed("empty signed document".to_string());
    }
    match STANDARD.decode(payload.as_bytes()) {
        Ok(bytes) => SignOutcome::Signed(bytes),
        Err(error) => SignOutcome::Malformed(format!("signed document is not base64: {error}")),
    }
}

/// SOAP body for the `signPdf` operation.
pub fn sign_pdf_envelope(request: &SignPdfRequest) -> String {
    format!(
        "<soapenv:Envelope xmlns:soapenv=\"http://schemas.xmlsoap.org/soap/envelope/\" \
         xmlns:ws=\"http://ds.ws.emas/\">\
         <soapenv:Header/>\
         <soapenv:Body>\
         <ws:signPdf>\
         <arg0>{txn}</arg0>\
         <arg1>{key_label}</arg1>\
         <arg2>{document}</arg2>\
         <arg3></arg3>\
         <arg4>{coordinates}</arg4>\
         <arg5>last</arg5>\
         <arg6></arg6>\
         <arg7></arg7>\
         <arg8>True</arg8>\
         <arg9>{otp}</arg9>\
         <arg10>single</arg10>\
         <arg11></arg11>\
         </ws:signPdf>\
         </soapenv:Body>\
         </soapenv:Envelope>",
        txn = xml_text(&request.transaction_id),
        key_label = xml_text(&request.key_label),
        document = request.document_base64,
        coordinates = request.coordinates,
        otp = xml_text(&request.otp),
    )
}

fn xml_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
