/// Description of one decodable telemetry field: where it lives in the
/// response frame and how to turn the raw integer into a real-world value.
///
/// The table below is the reverse-engineered layout of the Trannergy status
/// frame. All fields are big-endian. Extending the protocol means adding
/// rows here, not touching the decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub offset: usize,
    /// Width in bytes: 1, 2 or 4.
    pub width: usize,
    /// Multiplier applied to the raw integer, e.g. 0.1 for tenths of a volt.
    pub scale: f64,
    pub signed: bool,
    pub unit: &'static str,
    /// DC input / AC output line 1..3, where the field is per-channel.
    pub channel: Option<u8>,
}

/// Byte range of the inverter's own serial number string in the response.
pub const INVERTER_SN_RANGE: std::ops::Range<usize> = 15..31;

pub static FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "temperature",        offset: 31, width: 2, scale: 0.1,  signed: false, unit: "°C",  channel: None },
    FieldSpec { name: "dcinputvoltage1",    offset: 33, width: 2, scale: 0.1,  signed: false, unit: "V",   channel: Some(1) },
    FieldSpec { name: "dcinputvoltage2",    offset: 35, width: 2, scale: 0.1,  signed: false, unit: "V",   channel: Some(2) },
    FieldSpec { name: "dcinputvoltage3",    offset: 37, width: 2, scale: 0.1,  signed: false, unit: "V",   channel: Some(3) },
    FieldSpec { name: "dcinputcurrent1",    offset: 39, width: 2, scale: 0.1,  signed: false, unit: "A",   channel: Some(1) },
    FieldSpec { name: "dcinputcurrent2",    offset: 41, width: 2, scale: 0.1,  signed: false, unit: "A",   channel: Some(2) },
    FieldSpec { name: "dcinputcurrent3",    offset: 43, width: 2, scale: 0.1,  signed: false, unit: "A",   channel: Some(3) },
    FieldSpec { name: "acoutputcurrent1",   offset: 45, width: 2, scale: 0.1,  signed: false, unit: "A",   channel: Some(1) },
    FieldSpec { name: "acoutputcurrent2",   offset: 47, width: 2, scale: 0.1,  signed: false, unit: "A",   channel: Some(2) },
    FieldSpec { name: "acoutputcurrent3",   offset: 49, width: 2, scale: 0.1,  signed: false, unit: "A",   channel: Some(3) },
    FieldSpec { name: "acoutputvoltage1",   offset: 51, width: 2, scale: 0.1,  signed: false, unit: "V",   channel: Some(1) },
    FieldSpec { name: "acoutputvoltage2",   offset: 53, width: 2, scale: 0.1,  signed: false, unit: "V",   channel: Some(2) },
    FieldSpec { name: "acoutputvoltage3",   offset: 55, width: 2, scale: 0.1,  signed: false, unit: "V",   channel: Some(3) },
    FieldSpec { name: "acoutputfrequency1", offset: 57, width: 2, scale: 0.01, signed: false, unit: "Hz",  channel: Some(1) },
    FieldSpec { name: "acoutputpower1",     offset: 59, width: 2, scale: 1.0,  signed: false, unit: "W",   channel: Some(1) },
    FieldSpec { name: "acoutputfrequency2", offset: 61, width: 2, scale: 0.01, signed: false, unit: "Hz",  channel: Some(2) },
    FieldSpec { name: "acoutputpower2",     offset: 63, width: 2, scale: 1.0,  signed: false, unit: "W",   channel: Some(2) },
    FieldSpec { name: "acoutputfrequency3", offset: 65, width: 2, scale: 0.01, signed: false, unit: "Hz",  channel: Some(3) },
    FieldSpec { name: "acoutputpower3",     offset: 67, width: 2, scale: 1.0,  signed: false, unit: "W",   channel: Some(3) },
    // Same word as acoutputpower1; surfaced separately as the headline figure.
    FieldSpec { name: "actualpower",        offset: 59, width: 2, scale: 1.0,  signed: false, unit: "W",   channel: None },
    FieldSpec { name: "energytoday",        offset: 69, width: 2, scale: 0.01, signed: false, unit: "kWh", channel: None },
    FieldSpec { name: "energytotal",        offset: 71, width: 4, scale: 0.1,  signed: false, unit: "kWh", channel: None },
    FieldSpec { name: "hourstotal",         offset: 75, width: 4, scale: 1.0,  signed: false, unit: "h",   channel: None },
];

pub fn all() -> &'static [FieldSpec] {
    FIELDS
}

pub fn lookup(name: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.name == name)
}

/// Shortest response from which every catalog field can be extracted.
pub fn min_response_len() -> usize {
    FIELDS
        .iter()
        .map(|f| f.offset + f.width)
        .max()
        .unwrap_or(0)
        .max(INVERTER_SN_RANGE.end)
}
