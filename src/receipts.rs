//! Receipt rendering and storage.
//!
//! Receipts are rendered as simple paginated PDF documents (header,
//! invoice number, buyer email, itemized lines, GST line, totals) and
//! persisted to a local directory keyed by invoice id. Downloads go
//! through time-limited HMAC-signed URLs served by the receipts route,
//! standing in for a managed blob store's signed URLs.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};
use crate::models::Order;
use crate::util::{format_aud, format_date};

type HmacSha256 = Hmac<Sha256>;

/// Fixed lifetime of a signed receipt download URL.
pub const SIGNED_URL_TTL_SECS: i64 = 3600;

/// A4 in points.
const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
/// Body lines per page at 14pt leading.
const LINES_PER_PAGE: usize = 48;

// ============ Rendering ============

/// Render the receipt document for an order.
pub fn render_receipt_pdf(order: &Order) -> Vec<u8> {
    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("Invoice #: {}", order.invoice_number));
    lines.push(format!(
        "Customer Email: {}",
        order.user_email.as_deref().unwrap_or("N/A")
    ));
    lines.push(format!(
        "Order Date: {}",
        order
            .purchased_at
            .map(format_date)
            .unwrap_or_else(|| format_date(order.created_at))
    ));
    lines.push(String::new());
    lines.push("Items:".to_string());
    for product in &order.products {
        lines.push(format!(
            "- {} x{} - {}",
            product.name,
            product.quantity,
            format_aud(product.line_total_cents)
        ));
    }
    lines.push(String::new());
    lines.push(format!("Subtotal: {}", format_aud(order.subtotal_cents)));
    lines.push(format!("GST (included): {}", format_aud(order.gst_cents)));
    lines.push(format!("Total: {}", format_aud(order.total_cents)));

    build_pdf("Recovery Tools - Tax Invoice", &lines)
}

/// Escape a line for a PDF literal string. Non-ASCII characters are
/// replaced since the built-in font is not embedded with a Unicode map.
fn escape_pdf_text(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for c in line.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            ' '..='~' => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

fn page_content(title: Option<&str>, lines: &[String]) -> String {
    let mut content = String::from("BT\n");
    match title {
        Some(title) => {
            content.push_str("/F1 16 Tf\n50 790 Td\n14 TL\n");
            content.push_str(&format!("({}) Tj\n", escape_pdf_text(title)));
            content.push_str("/F1 11 Tf\nT*\nT*\n");
        }
        None => {
            content.push_str("/F1 11 Tf\n50 790 Td\n14 TL\n");
        }
    }
    for line in lines {
        content.push_str(&format!("({}) Tj\nT*\n", escape_pdf_text(line)));
    }
    content.push_str("ET");
    content
}

/// Assemble a multi-page PDF with one shared Type1 Helvetica font.
fn build_pdf(title: &str, lines: &[String]) -> Vec<u8> {
    let empty: &[String] = &[];
    let chunks: Vec<&[String]> = if lines.is_empty() {
        vec![empty]
    } else {
        lines.chunks(LINES_PER_PAGE).collect()
    };
    let page_count = chunks.len();

    // Objects: 1 catalog, 2 page tree, 3 font, then (page, content) pairs.
    let mut objects: Vec<String> = Vec::with_capacity(3 + page_count * 2);

    let kids: Vec<String> = (0..page_count)
        .map(|i| format!("{} 0 R", 4 + i * 2))
        .collect();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        page_count
    ));
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());

    for (i, chunk) in chunks.iter().enumerate() {
        let content = page_content(if i == 0 { Some(title) } else { None }, chunk);
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            PAGE_WIDTH,
            PAGE_HEIGHT,
            5 + i * 2
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ));
    }

    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    let mut offsets: Vec<usize> = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );

    out
}

// ============ Storage ============

/// Invoice ids double as file names; anything outside the Stripe session
/// id alphabet is rejected before touching the filesystem.
fn valid_invoice_id(invoice_id: &str) -> bool {
    !invoice_id.is_empty()
        && invoice_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Durable receipt storage with HMAC-signed, time-limited download URLs.
#[derive(Debug, Clone)]
pub struct ReceiptStore {
    root: PathBuf,
    signing_key: String,
    base_url: String,
}

impl ReceiptStore {
    pub fn new(
        root: impl Into<PathBuf>,
        signing_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            signing_key: signing_key.into(),
            base_url: base_url.into(),
        }
    }

    fn invoice_path(&self, invoice_id: &str) -> Result<PathBuf> {
        if !valid_invoice_id(invoice_id) {
            return Err(AppError::InvalidArgument(format!(
                "Invalid invoice id: {}",
                invoice_id
            )));
        }
        Ok(self.root.join("invoices").join(format!("{}.pdf", invoice_id)))
    }

    /// Persist a rendered receipt under the invoice id.
    pub fn put(&self, invoice_id: &str, bytes: &[u8]) -> Result<()> {
        let path = self.invoice_path(invoice_id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::Internal(format!("Receipt dir create failed: {}", e)))?;
        }
        fs::write(&path, bytes)
            .map_err(|e| AppError::Internal(format!("Receipt write failed: {}", e)))
    }

    /// Read a stored receipt; None if it was never generated.
    pub fn read(&self, invoice_id: &str) -> Result<Option<Vec<u8>>> {
        let path = self.invoice_path(invoice_id)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Internal(format!("Receipt read failed: {}", e))),
        }
    }

    fn sign(&self, invoice_id: &str, expires: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(self.signing_key.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(format!("{}.{}", invoice_id, expires).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Time-limited download URL for a stored receipt.
    pub fn signed_url(&self, invoice_id: &str) -> Result<String> {
        if !valid_invoice_id(invoice_id) {
            return Err(AppError::InvalidArgument(format!(
                "Invalid invoice id: {}",
                invoice_id
            )));
        }
        let expires = Utc::now().timestamp() + SIGNED_URL_TTL_SECS;
        let sig = self.sign(invoice_id, expires);
        Ok(format!(
            "{}/receipts/{}.pdf?expires={}&sig={}",
            self.base_url, invoice_id, expires, sig
        ))
    }

    /// Check a download signature and its expiry.
    pub fn verify(&self, invoice_id: &str, expires: i64, sig: &str) -> bool {
        if !valid_invoice_id(invoice_id) || expires < Utc::now().timestamp() {
            return false;
        }
        let expected = self.sign(invoice_id, expires);
        let expected_bytes = expected.as_bytes();
        let provided_bytes = sig.as_bytes();
        if expected_bytes.len() != provided_bytes.len() {
            return false;
        }
        expected_bytes.ct_eq(provided_bytes).into()
    }
}
