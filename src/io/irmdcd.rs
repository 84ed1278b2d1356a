//! IRM/DCD remanence-curve ingest and delta-M pairing.
//!
//! A remanence `.dat` file shares the `[Data]`/header layout of the FORC
//! export but alternates two kinds of lines per step: a set-field line
//! (sample prepared at a finite field) followed by a remanence line
//! (measured near zero field). Two section markers switch which curve the
//! pairs belong to. The parser pairs lines via the cursor's explicit
//! lookahead; any incomplete or implausible pair is skipped and logged.

use std::io::BufRead;

use crate::audit::AuditLog;
use crate::domain::ColumnNames;
use crate::error::LoadError;
use crate::io::cursor::LineCursor;
use crate::io::dat::{parse_data_line, resolve_columns, DATA_SENTINEL};

/// Fields below this magnitude (tesla) count as "zero" for remanence checks.
const ZERO_FIELD_TOLERANCE: f64 = 1e-3;

/// Resolved input conventions for one remanence load.
#[derive(Debug, Clone)]
pub struct RemanenceSpec {
    pub marker_irm: String,
    pub marker_dcd: String,
    pub columns: ColumnNames,
}

impl Default for RemanenceSpec {
    fn default() -> Self {
        Self {
            marker_irm: "IRM MEASUREMENT".to_string(),
            marker_dcd: "DCD MEASUREMENT".to_string(),
            columns: ColumnNames::default(),
        }
    }
}

/// One remanence curve: moment measured at zero field after preparation at
/// `h[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemanenceCurve {
    /// Preparation field (tesla).
    pub h: Vec<f64>,
    /// Remanent moment (milli-emu).
    pub m: Vec<f64>,
    /// Standard error of the remanent moment (milli-emu).
    pub s_m: Vec<f64>,
}

impl RemanenceCurve {
    pub fn len(&self) -> usize {
        self.h.len()
    }

    pub fn is_empty(&self) -> bool {
        self.h.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemanenceData {
    pub irm: RemanenceCurve,
    pub dcd: RemanenceCurve,
}

/// A delta-M point: DCD remanence compared against the Wohlfarth relation
/// prediction from the IRM curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaMPoint {
    /// Field magnitude (tesla).
    pub field: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Irm,
    Dcd,
}

/// What the lookahead found after a set-field line.
enum PairNext {
    Eof,
    CommentOrBlank,
    Marker,
    Remanence,
}

/// Parse an IRM/DCD `.dat` stream into the two remanence curves.
pub fn parse_remanence_dat<R: BufRead>(
    reader: R,
    spec: &RemanenceSpec,
    audit: &mut AuditLog,
) -> Result<RemanenceData, LoadError> {
    let mut cursor = LineCursor::new(reader);

    // Preamble: skip until the section sentinel.
    loop {
        let Some(line) = cursor.next_line()? else {
            return Err(LoadError::MissingDataSection(DATA_SENTINEL));
        };
        if line.contains(DATA_SENTINEL) {
            break;
        }
    }
    audit.push(format!("data section at line {}", cursor.line_number()));

    let Some(header) = cursor.next_line()? else {
        return Err(LoadError::MissingColumn(spec.columns.temperature.clone()));
    };
    let columns = resolve_columns(&header, &spec.columns)?;

    let mut data = RemanenceData::default();
    let mut target: Option<Target> = None;

    while let Some(line) = cursor.next_line()? {
        if line.contains(&spec.marker_irm) {
            target = Some(Target::Irm);
            continue;
        }
        if line.contains(&spec.marker_dcd) {
            target = Some(Target::Dcd);
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let Some(current) = target else {
            audit.push(format!(
                "line {}: data before first remanence marker skipped",
                cursor.line_number()
            ));
            continue;
        };

        // Set-field line: the sample must have been prepared at a finite field.
        let set = parse_data_line(&line, &columns, cursor.line_number(), &spec.columns)?;
        if set.field.abs() < ZERO_FIELD_TOLERANCE {
            audit.push(format!(
                "line {}: set field too small in magnitude, skipping line",
                cursor.line_number()
            ));
            continue;
        }

        // Pair it with the following remanence line via explicit lookahead.
        let next = match cursor.peek()? {
            None => PairNext::Eof,
            Some(peeked) => {
                let t = peeked.trim();
                if t.is_empty() || t.starts_with('#') {
                    PairNext::CommentOrBlank
                } else if peeked.contains(&spec.marker_irm) || peeked.contains(&spec.marker_dcd) {
                    PairNext::Marker
                } else {
                    PairNext::Remanence
                }
            }
        };

        match next {
            PairNext::Eof => {
                audit.push(format!(
                    "line {}: set-field line has no remanence partner at end of stream, \
                     skipping pair",
                    cursor.line_number()
                ));
                break;
            }
            PairNext::CommentOrBlank => {
                cursor.next_line()?;
                audit.push(format!(
                    "line {}: supposed remanence line is a comment or empty, skipping pair",
                    cursor.line_number()
                ));
                continue;
            }
            PairNext::Marker => {
                // Leave the marker for the main loop to consume.
                audit.push(format!(
                    "line {}: set-field line followed by a section marker, skipping pair",
                    cursor.line_number()
                ));
                continue;
            }
            PairNext::Remanence => {}
        }

        let rem_line = cursor
            .next_line()?
            .expect("lookahead guaranteed a remanence line");
        let rem = parse_data_line(&rem_line, &columns, cursor.line_number(), &spec.columns)?;

        if rem.field.abs() > ZERO_FIELD_TOLERANCE {
            audit.push(format!(
                "line {}: remanence measurement is not at zero field, skipping pair",
                cursor.line_number()
            ));
            continue;
        }

        let curve = match current {
            Target::Irm => &mut data.irm,
            Target::Dcd => &mut data.dcd,
        };
        curve.h.push(set.field);
        curve.m.push(rem.moment);
        curve.s_m.push(rem.moment_err);
    }

    audit.push(format!(
        "remanence curves: {} IRM pairs, {} DCD pairs",
        data.irm.len(),
        data.dcd.len()
    ));

    Ok(data)
}

/// Compute the delta-M curve from paired remanence measurements.
///
/// For non-interacting single-domain particles the Wohlfarth relation
/// predicts `M_dcd(H) = M_s - 2 * M_irm(H)`; the deviation
///
/// ```text
/// dM(H) = M_dcd(H) - (M_s - 2 * M_irm(H))
/// ```
///
/// is the interaction signature. DCD preparation fields are negative, so
/// each DCD point is paired with the IRM point whose field is nearest in
/// magnitude.
pub fn delta_m(data: &RemanenceData, saturation_moment: f64) -> Vec<DeltaMPoint> {
    if data.irm.is_empty() {
        return Vec::new();
    }

    data.dcd
        .h
        .iter()
        .zip(data.dcd.m.iter())
        .map(|(&h_dcd, &m_dcd)| {
            let field = h_dcd.abs();
            let nearest = data
                .irm
                .h
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    (*a - field)
                        .abs()
                        .partial_cmp(&(*b - field).abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(idx, _)| idx)
                .expect("irm curve is non-empty");
            let m_irm = data.irm.m[nearest];
            DeltaMPoint {
                field,
                delta: m_dcd - (saturation_moment - 2.0 * m_irm),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Comment,Temperature (K),Magnetic Field (Oe),Moment (emu),M. Std. Err. (emu)";

    fn pair(set_oe: f64, rem_moment_emu: f64) -> String {
        format!(",300.0,{set_oe},0.0,0.0\n,300.0,0.0,{rem_moment_emu},0.0001\n")
    }

    fn build_file() -> String {
        let mut out = String::from("preamble\n[Data]\n");
        out.push_str(HEADER);
        out.push('\n');
        out.push_str("\"IRM MEASUREMENT\",,,,\n");
        out.push_str(&pair(1_000.0, 0.001));
        out.push_str(&pair(2_000.0, 0.002));
        out.push_str("\"DCD MEASUREMENT\",,,,\n");
        out.push_str(&pair(-1_000.0, -0.001));
        out.push_str(&pair(-2_000.0, 0.0005));
        out
    }

    #[test]
    fn pairs_are_split_between_curves() {
        let mut audit = AuditLog::new();
        let data =
            parse_remanence_dat(build_file().as_bytes(), &RemanenceSpec::default(), &mut audit)
                .unwrap();

        assert_eq!(data.irm.len(), 2);
        assert_eq!(data.dcd.len(), 2);
        assert_eq!(data.irm.h, vec![0.1, 0.2]);
        assert_eq!(data.irm.m, vec![1.0, 2.0]);
        assert_eq!(data.dcd.h, vec![-0.1, -0.2]);
    }

    #[test]
    fn nonzero_remanence_pair_is_skipped() {
        let mut text = String::from("[Data]\n");
        text.push_str(HEADER);
        text.push('\n');
        text.push_str("\"IRM MEASUREMENT\",,,,\n");
        // Remanence line at a clearly finite field: pair rejected.
        text.push_str(",300.0,1000.0,0.0,0.0\n,300.0,500.0,0.001,0.0001\n");
        text.push_str(&pair(2_000.0, 0.002));

        let mut audit = AuditLog::new();
        let data =
            parse_remanence_dat(text.as_bytes(), &RemanenceSpec::default(), &mut audit).unwrap();

        assert_eq!(data.irm.len(), 1);
        assert_eq!(data.irm.h, vec![0.2]);
        assert!(audit
            .events()
            .iter()
            .any(|e| e.contains("not at zero field")));
    }

    #[test]
    fn set_field_followed_by_marker_keeps_marker() {
        let mut text = String::from("[Data]\n");
        text.push_str(HEADER);
        text.push('\n');
        text.push_str("\"IRM MEASUREMENT\",,,,\n");
        text.push_str(",300.0,1000.0,0.0,0.0\n");
        text.push_str("\"DCD MEASUREMENT\",,,,\n");
        text.push_str(&pair(-3_000.0, -0.003));

        let mut audit = AuditLog::new();
        let data =
            parse_remanence_dat(text.as_bytes(), &RemanenceSpec::default(), &mut audit).unwrap();

        // The dangling IRM set-field line is dropped, but the DCD marker it
        // collided with still takes effect.
        assert!(data.irm.is_empty());
        assert_eq!(data.dcd.h, vec![-0.3]);
    }

    #[test]
    fn delta_m_pairs_by_nearest_field_magnitude() {
        let data = RemanenceData {
            irm: RemanenceCurve {
                h: vec![0.1, 0.2, 0.3],
                m: vec![1.0, 2.0, 3.0],
                s_m: vec![0.1; 3],
            },
            dcd: RemanenceCurve {
                h: vec![-0.11, -0.29],
                m: vec![4.0, 2.0],
                s_m: vec![0.1; 2],
            },
        };

        let dm = delta_m(&data, 6.0);
        assert_eq!(dm.len(), 2);
        // Nearest IRM fields are 0.1 and 0.3.
        assert!((dm[0].delta - (4.0 - (6.0 - 2.0 * 1.0))).abs() < 1e-12);
        assert!((dm[1].delta - (2.0 - (6.0 - 2.0 * 3.0))).abs() < 1e-12);
    }
}
