//! Cross-slot natural-language health summary.

use super::structuring::{OrderedSet, ParsedPrescription};

/// Returned when no slot produced a parsed record.
pub const NO_DATA_SUMMARY: &str =
    "No prescription data could be reliably extracted from the images.";

const INTRO: &str =
    "Based on the uploaded prescriptions, the patient is currently under medical treatment.";

const DIAGNOSIS_UNCLEAR: &str =
    " The exact diagnosis is not clearly mentioned in the text extracted.";

const DISCLAIMER: &str = " This is an approximate summary generated from OCR and should not be used as a substitute for professional medical advice.";

/// Medicines listed by name before the list is cut off.
pub const MAX_LISTED_MEDICINES: usize = 10;

const MORE_MEDICINES_MARKER: &str = " (and others)";

/// Aggregated entities across slots, each in first-seen order.
#[derive(Debug, Default)]
struct Aggregate {
    doctors: OrderedSet<String>,
    diagnosis: OrderedSet<String>,
    medicines: OrderedSet<String>,
    frequency: OrderedSet<String>,
    duration: OrderedSet<String>,
}

impl Aggregate {
    fn add(&mut self, record: &ParsedPrescription) {
        self.diagnosis.extend(record.diagnosis.iter().cloned());
        self.medicines
            .extend(record.medicines.iter().map(|m| m.name.clone()));
        self.duration.extend(record.duration.iter().cloned());
        self.frequency.extend(record.frequency.iter().cloned());
        if let Some(doctor) = &record.doctor {
            self.doctors.insert(doctor.clone());
        }
    }
}

/// Build one paragraph from the parsed records of every slot that had text.
///
/// Clauses appear in a fixed order: intro, doctors, diagnosis (or an
/// explicit "not clearly mentioned"), medicines (first ten names), frequency,
/// duration, disclaimer. Optional clauses are omitted when empty.
pub fn generate_health_summary<'a, I>(records: I) -> String
where
    I: IntoIterator<Item = &'a ParsedPrescription>,
{
    let mut aggregate = Aggregate::default();
    let mut any = false;
    for record in records {
        aggregate.add(record);
        any = true;
    }

    if !any {
        return NO_DATA_SUMMARY.to_string();
    }

    let mut summary = String::from(INTRO);

    if !aggregate.doctors.is_empty() {
        summary.push_str(&format!(
            " The prescriptions appear to be written by: {}.",
            aggregate.doctors.as_slice().join(", ")
        ));
    }

    if aggregate.diagnosis.is_empty() {
        summary.push_str(DIAGNOSIS_UNCLEAR);
    } else {
        summary.push_str(&format!(
            " The main health issues mentioned include: {}.",
            aggregate.diagnosis.as_slice().join(", ")
        ));
    }

    if !aggregate.medicines.is_empty() {
        let medicines = aggregate.medicines.as_slice();
        let listed = &medicines[..medicines.len().min(MAX_LISTED_MEDICINES)];
        summary.push_str(&format!(
            " Medicines prescribed include: {}.",
            listed.join(", ")
        ));
        if medicines.len() > MAX_LISTED_MEDICINES {
            summary.push_str(MORE_MEDICINES_MARKER);
        }
    }

    if !aggregate.frequency.is_empty() {
        summary.push_str(&format!(
            " The dosage/frequency patterns detected include: {}.",
            aggregate.frequency.as_slice().join(", ")
        ));
    }

    if !aggregate.duration.is_empty() {
        summary.push_str(&format!(
            " The treatment duration mentioned includes: {}.",
            aggregate.duration.as_slice().join(", ")
        ));
    }

    summary.push_str(DISCLAIMER);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::structuring::Medicine;

    fn medicine(name: &str) -> Medicine {
        Medicine {
            name: name.into(),
            dosage: None,
            raw: name.into(),
        }
    }

    fn record(doctor: Option<&str>, diagnosis: &[&str], medicines: &[&str]) -> ParsedPrescription {
        ParsedPrescription {
            doctor: doctor.map(str::to_string),
            diagnosis: diagnosis.iter().map(|s| s.to_string()).collect(),
            medicines: medicines.iter().map(|m| medicine(m)).collect(),
            duration: Vec::new(),
            frequency: Vec::new(),
        }
    }

    #[test]
    fn empty_input_returns_fixed_sentence() {
        let records: [ParsedPrescription; 0] = [];
        assert_eq!(
            generate_health_summary(&records),
            "No prescription data could be reliably extracted from the images."
        );
    }

    #[test]
    fn empty_record_emits_intro_fallback_and_disclaimer() {
        let summary = generate_health_summary(&[ParsedPrescription::default()]);
        assert_eq!(
            summary,
            format!("{INTRO}{DIAGNOSIS_UNCLEAR}{DISCLAIMER}")
        );
    }

    #[test]
    fn full_summary_clause_order() {
        let mut morning = record(Some("Dr. A Sharma"), &["fever", "cold"], &["Paracetamol"]);
        morning.frequency = vec!["1-1-1".into(), "after food".into()];
        morning.duration = vec!["5 days".into()];
        let mut night = record(Some("Dr. A Sharma"), &["cold", "cough"], &["Azithromycin"]);
        night.duration = vec!["3 days".into(), "5 days".into()];

        let summary = generate_health_summary(&[morning, night]);

        assert_eq!(
            summary,
            "Based on the uploaded prescriptions, the patient is currently under medical treatment. \
The prescriptions appear to be written by: Dr. A Sharma. \
The main health issues mentioned include: fever, cold, cough. \
Medicines prescribed include: Paracetamol, Azithromycin. \
The dosage/frequency patterns detected include: 1-1-1, after food. \
The treatment duration mentioned includes: 5 days, 3 days. \
This is an approximate summary generated from OCR and should not be used as a substitute for professional medical advice."
        );
    }

    #[test]
    fn medicines_capped_at_ten_with_marker() {
        let names: Vec<String> = (1..=12).map(|i| format!("Med{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let summary = generate_health_summary(&[record(None, &["pain"], &refs)]);

        let expected_list = (1..=10)
            .map(|i| format!("Med{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        assert!(summary.contains(&format!(
            " Medicines prescribed include: {expected_list}. (and others)"
        )));
        assert!(!summary.contains("Med11"));
        assert!(summary.ends_with(DISCLAIMER));
    }

    #[test]
    fn exactly_ten_medicines_has_no_marker() {
        let names: Vec<String> = (1..=10).map(|i| format!("Med{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let summary = generate_health_summary(&[record(None, &[], &refs)]);
        assert!(summary.contains("Med10."));
        assert!(!summary.contains("(and others)"));
    }

    #[test]
    fn medicine_names_deduplicated_across_records() {
        let summary = generate_health_summary(&[
            record(None, &[], &["Dolo", "Omez"]),
            record(None, &[], &["Omez", "Dolo", "Zyrtec"]),
        ]);
        assert!(summary.contains(" Medicines prescribed include: Dolo, Omez, Zyrtec."));
    }

    #[test]
    fn doctors_clause_omitted_without_doctor() {
        let summary = generate_health_summary(&[record(None, &["flu"], &[])]);
        assert!(!summary.contains("written by"));
        assert!(summary.contains(" The main health issues mentioned include: flu."));
        assert!(!summary.contains("Medicines prescribed"));
    }
}
