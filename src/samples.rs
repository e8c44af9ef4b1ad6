//! Built-in example payloads for the demo frontend.

use serde::Serialize;

use crate::query::{ComplexCaseQuery, SimpleInteractionQuery};

/// A complex example with a short label.
#[derive(Debug, Clone, Serialize)]
pub struct ComplexExample {
    pub description: String,
    #[serde(flatten)]
    pub query: ComplexCaseQuery,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleQueries {
    pub simple_examples: Vec<SimpleInteractionQuery>,
    pub complex_examples: Vec<ComplexExample>,
}

fn case(
    description: &str,
    medications: &[&str],
    age: u32,
    conditions: &[&str],
    labs: &[(&str, &str)],
) -> ComplexExample {
    ComplexExample {
        description: description.to_string(),
        query: ComplexCaseQuery {
            medications: medications.iter().map(|s| s.to_string()).collect(),
            age,
            conditions: conditions.iter().map(|s| s.to_string()).collect(),
            lab_values: labs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            additional_context: String::new(),
        },
    }
}

/// The fixed example set.
pub fn sample_queries() -> SampleQueries {
    SampleQueries {
        simple_examples: vec![
            SimpleInteractionQuery::new("warfarin", "aspirin"),
            SimpleInteractionQuery::new("metformin", "contrast dye"),
            SimpleInteractionQuery::new("simvastatin", "clarithromycin"),
        ],
        complex_examples: vec![
            case(
                "Elderly patient with polypharmacy",
                &["warfarin", "aspirin", "omeprazole", "metoprolol", "amlodipine"],
                78,
                &["atrial fibrillation", "hypertension", "GERD"],
                &[("INR", "3.2"), ("CrCl", "45 mL/min")],
            ),
            case(
                "Diabetic patient with cardiovascular disease",
                &["metformin", "glipizide", "atorvastatin", "lisinopril", "clopidogrel"],
                65,
                &["type 2 diabetes", "CAD s/p stent", "hyperlipidemia"],
                &[("HbA1c", "8.2%"), ("eGFR", "58")],
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_are_valid_queries() {
        let samples = sample_queries();
        assert_eq!(samples.simple_examples.len(), 3);
        assert_eq!(samples.complex_examples.len(), 2);

        for q in samples.simple_examples {
            assert!(q.validate().is_ok());
        }
        for ex in samples.complex_examples {
            assert!(ex.query.validate().is_ok());
        }
    }

    #[test]
    fn test_complex_example_is_flat() {
        let json = serde_json::to_value(sample_queries()).unwrap();
        let first = &json["complex_examples"][0];
        assert_eq!(first["description"], "Elderly patient with polypharmacy");
        assert_eq!(first["age"], 78);
        assert_eq!(first["lab_values"]["INR"], "3.2");
    }
}
