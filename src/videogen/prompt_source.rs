use crate::error::ApiError;

/// Upload formats a prompt list can arrive in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Csv,
}

impl UploadKind {
    pub fn from_filename(filename: &str) -> Result<Self, ApiError> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("csv") => Ok(Self::Csv),
            _ => Err(ApiError::UnsupportedFormat),
        }
    }
}

/// Turns an uploaded prompt list into ordered, trimmed, non-empty prompts.
/// Only the first column of each record is used; no header detection and no
/// de-duplication. Quoted fields may span lines.
pub fn normalize(raw: &[u8], kind: UploadKind) -> Result<Vec<String>, ApiError> {
    let text = std::str::from_utf8(raw).map_err(|_| ApiError::InvalidEncoding)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let prompts = match kind {
        UploadKind::Csv => csv_prompts(text)?,
    };

    if prompts.is_empty() {
        return Err(ApiError::EmptyInput);
    }

    Ok(prompts)
}

fn csv_prompts(text: &str) -> Result<Vec<String>, ApiError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut prompts = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| {
            log::warn!("Failed to read CSV upload: {}", e);
            ApiError::MalformedCsv
        })?;

        let prompt = record.get(0).unwrap_or_default().trim();
        if !prompt.is_empty() {
            prompts.push(prompt.to_string());
        }
    }
    Ok(prompts)
}
