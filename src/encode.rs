use barcoders::sym::code128::Code128;
use qrcode::{EcLevel, QrCode};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbology {
    Qr,
    Code128,
}

impl Symbology {
    pub fn as_str(self) -> &'static str {
        match self {
            Symbology::Qr => "qr",
            Symbology::Code128 => "code128",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeError {
    pub message: String,
}

impl EncodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EncodeError {}

/// Module matrix produced by an encoder. Row 0 is the top row. `quiet_zone`
/// is the number of light modules a writer keeps clear around the matrix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bitmap {
    columns: usize,
    rows: usize,
    quiet_zone: usize,
    modules: Vec<bool>,
}

impl Bitmap {
    pub fn new(columns: usize, rows: usize, modules: Vec<bool>) -> Result<Self, EncodeError> {
        if columns == 0 || rows == 0 {
            return Err(EncodeError::new("empty module matrix"));
        }
        if modules.len() != columns * rows {
            return Err(EncodeError::new(format!(
                "module count {} does not match {}x{}",
                modules.len(),
                columns,
                rows
            )));
        }
        Ok(Self {
            columns,
            rows,
            quiet_zone: 0,
            modules,
        })
    }

    pub fn with_quiet_zone(mut self, modules: usize) -> Self {
        self.quiet_zone = modules;
        self
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn quiet_zone(&self) -> usize {
        self.quiet_zone
    }

    pub fn is_dark(&self, column: usize, row: usize) -> bool {
        if column >= self.columns || row >= self.rows {
            return false;
        }
        self.modules[row * self.columns + column]
    }

    pub fn dark_count(&self) -> usize {
        self.modules.iter().filter(|m| **m).count()
    }

    /// Horizontal runs of dark modules in `row` as `(start, length)`.
    pub fn dark_runs(&self, row: usize) -> Vec<(usize, usize)> {
        let mut runs = Vec::new();
        let mut start = None;
        for column in 0..self.columns {
            match (self.is_dark(column, row), start) {
                (true, None) => start = Some(column),
                (false, Some(s)) => {
                    runs.push((s, column - s));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            runs.push((s, self.columns - s));
        }
        runs
    }
}

pub trait QrEncoder: Send + Sync {
    fn encode(&self, payload: &str) -> Result<Bitmap, EncodeError>;
}

pub trait BarcodeEncoder: Send + Sync {
    fn encode(&self, payload: &str) -> Result<Bitmap, EncodeError>;
}

/// QR encoder backed by the `qrcode` crate.
#[derive(Debug, Clone, Copy)]
pub struct QrCodeEncoder {
    level: EcLevel,
    quiet_zone: usize,
}

impl Default for QrCodeEncoder {
    fn default() -> Self {
        Self {
            level: EcLevel::H,
            quiet_zone: 2,
        }
    }
}

impl QrCodeEncoder {
    pub fn with_level(level: EcLevel) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }
}

impl QrEncoder for QrCodeEncoder {
    fn encode(&self, payload: &str) -> Result<Bitmap, EncodeError> {
        if payload.is_empty() {
            return Err(EncodeError::new("empty payload"));
        }
        let code = QrCode::with_error_correction_level(payload.as_bytes(), self.level)
            .map_err(|err| EncodeError::new(err.to_string()))?;
        let width = code.width();
        let modules = code
            .to_colors()
            .into_iter()
            .map(|color| color == qrcode::Color::Dark)
            .collect();
        Ok(Bitmap::new(width, width, modules)?.with_quiet_zone(self.quiet_zone))
    }
}

/// Code 128 encoder backed by `barcoders`, always in character set B.
#[derive(Debug, Clone, Copy, Default)]
pub struct Code128Encoder;

// Leading character that selects Code 128 set B in `barcoders`.
const CODE128_SET_B: char = 'Ɓ';

impl BarcodeEncoder for Code128Encoder {
    fn encode(&self, payload: &str) -> Result<Bitmap, EncodeError> {
        if payload.is_empty() {
            return Err(EncodeError::new("empty payload"));
        }
        if let Some(bad) = payload.chars().find(|c| !(' '..='~').contains(c)) {
            return Err(EncodeError::new(format!(
                "character {bad:?} is not printable ASCII"
            )));
        }
        let mut data = String::with_capacity(payload.len() + 2);
        data.push(CODE128_SET_B);
        data.push_str(payload);
        let symbol = Code128::new(data).map_err(|err| EncodeError::new(err.to_string()))?;
        let bars: Vec<bool> = symbol.encode().into_iter().map(|bar| bar == 1).collect();
        Bitmap::new(bars.len(), 1, bars)
    }
}
