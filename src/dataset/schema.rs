//! The fixed cohort schema: sixteen Framingham-style clinical features.

use super::FeatureDescriptor;

pub const MALE: &str = "male";
pub const AGE: &str = "age";
pub const EDUCATION: &str = "education";
pub const CURRENT_SMOKER: &str = "currentSmoker";
pub const CIGS_PER_DAY: &str = "cigsPerDay";
pub const BP_MEDS: &str = "BPMeds";
pub const PREVALENT_STROKE: &str = "prevalentStroke";
pub const PREVALENT_HYP: &str = "prevalentHyp";
pub const DIABETES: &str = "diabetes";
pub const TOT_CHOL: &str = "totChol";
pub const SYS_BP: &str = "sysBP";
pub const DIA_BP: &str = "diaBP";
pub const BMI: &str = "BMI";
pub const HEART_RATE: &str = "heartRate";
pub const GLUCOSE: &str = "glucose";
/// Ten-year coronary heart disease outcome flag.
pub const TEN_YEAR_CHD: &str = "TenYearCHD";

/// Every feature of the schema, in column order of the source table.
pub const ALL_FEATURES: [&str; 16] = [
    MALE,
    AGE,
    EDUCATION,
    CURRENT_SMOKER,
    CIGS_PER_DAY,
    BP_MEDS,
    PREVALENT_STROKE,
    PREVALENT_HYP,
    DIABETES,
    TOT_CHOL,
    SYS_BP,
    DIA_BP,
    BMI,
    HEART_RATE,
    GLUCOSE,
    TEN_YEAR_CHD,
];

fn flag(name: &str, no: &str, yes: &str) -> FeatureDescriptor {
    FeatureDescriptor {
        name: name.to_string(),
        kind: super::FeatureKind::Categorical,
        domain: vec![0.0, 1.0],
        labels: vec![no.to_string(), yes.to_string()],
    }
}

pub fn cohort_descriptors() -> Vec<FeatureDescriptor> {
    vec![
        flag(MALE, "Female", "Male"),
        FeatureDescriptor::numeric(AGE),
        FeatureDescriptor {
            name: EDUCATION.to_string(),
            kind: super::FeatureKind::Ordinal,
            domain: vec![1.0, 2.0, 3.0, 4.0],
            labels: vec![
                "Some high school".to_string(),
                "High school or GED".to_string(),
                "Some college or vocational school".to_string(),
                "College".to_string(),
            ],
        },
        flag(CURRENT_SMOKER, "Non-smoker", "Smoker"),
        FeatureDescriptor::numeric(CIGS_PER_DAY),
        flag(BP_MEDS, "No BP medication", "On BP medication"),
        flag(PREVALENT_STROKE, "No prior stroke", "Prior stroke"),
        flag(PREVALENT_HYP, "Not hypertensive", "Hypertensive"),
        flag(DIABETES, "No diabetes", "Diabetes"),
        FeatureDescriptor::numeric(TOT_CHOL),
        FeatureDescriptor::numeric(SYS_BP),
        FeatureDescriptor::numeric(DIA_BP),
        FeatureDescriptor::numeric(BMI),
        FeatureDescriptor::numeric(HEART_RATE),
        FeatureDescriptor::numeric(GLUCOSE),
        flag(TEN_YEAR_CHD, "No CHD within 10 years", "CHD within 10 years"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dataset, FeatureKind, Record};

    #[test]
    fn test_schema_covers_all_features() {
        let descriptors = cohort_descriptors();
        assert_eq!(descriptors.len(), ALL_FEATURES.len());
        for (descriptor, name) in descriptors.iter().zip(ALL_FEATURES) {
            assert_eq!(descriptor.name(), name);
        }
    }

    #[test]
    fn test_schema_kinds() {
        let dataset = Dataset::with_cohort_schema(vec![Record::from_pairs([
            (EDUCATION, Some(3.0)),
            (MALE, Some(1.0)),
        ])])
        .unwrap();

        assert_eq!(dataset.descriptor(EDUCATION).unwrap().kind(), FeatureKind::Ordinal);
        assert_eq!(dataset.descriptor(GLUCOSE).unwrap().kind(), FeatureKind::Numeric);
        assert_eq!(dataset.descriptor(MALE).unwrap().label_for(1.0), Some("Male"));
    }

    #[test]
    fn test_schema_rejects_out_of_domain_education() {
        let result = Dataset::with_cohort_schema(vec![Record::from_pairs([(EDUCATION, Some(7.0))])]);
        assert!(result.is_err());
    }
}
