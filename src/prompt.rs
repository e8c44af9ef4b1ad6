//! Prompt templates.
//!
//! Both templates use the `[INST] ... [/INST]` instruction format and end
//! with a numbered list of the sections the answer should contain; the
//! response parser in [`crate::analysis`] relies on that numbering.

use crate::query::{ComplexCaseQuery, SimpleInteractionQuery};

/// Severity labels the simple template asks the model to choose from.
pub const SEVERITY_LABELS: [&str; 5] = ["None", "Low", "Moderate", "High", "Contraindicated"];

/// Prompt for a two-drug interaction query.
pub fn simple_prompt(query: &SimpleInteractionQuery) -> String {
    format!(
        "[INST] As a clinical pharmacist, analyze the drug interaction between {drug1} and {drug2}.

Provide:
1. Interaction severity ({labels})
2. Clinical mechanism of interaction
3. Patient monitoring recommendations
4. Alternative medications if interaction is significant

Be concise but thorough. [/INST]",
        drug1 = query.drug1,
        drug2 = query.drug2,
        labels = SEVERITY_LABELS.join("/"),
    )
}

/// Prompt for a multi-drug patient case.
pub fn complex_prompt(query: &ComplexCaseQuery) -> String {
    let conditions = if query.conditions.is_empty() {
        "None reported".to_string()
    } else {
        query.conditions.join(", ")
    };

    let mut profile = format!(
        "- Age: {} years old\n- Current medications: {}\n- Medical conditions: {}\n",
        query.age,
        query.medications.join(", "),
        conditions,
    );
    if !query.lab_values.is_empty() {
        let labs: Vec<String> = query
            .lab_values
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect();
        profile.push_str(&format!("- Lab values: {}\n", labs.join(", ")));
    }
    if !query.additional_context.is_empty() {
        profile.push_str(&format!("- Additional context: {}\n", query.additional_context));
    }

    format!(
        "[INST] You are a clinical decision support AI. Analyze this complex patient case:

Patient Profile:
{profile}
Provide analysis of:
1. Drug-drug interactions (rank by severity)
2. Risk assessment
3. Monitoring recommendations
4. Priority actions

Be thorough but concise. [/INST]"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_prompt() {
        let p = simple_prompt(&SimpleInteractionQuery::new("warfarin", "aspirin"));
        assert!(p.starts_with("[INST]"));
        assert!(p.ends_with("[/INST]"));
        assert!(p.contains("between warfarin and aspirin"));
        assert!(p.contains("(None/Low/Moderate/High/Contraindicated)"));
        assert!(p.contains("4. Alternative medications"));
    }

    #[test]
    fn test_complex_prompt_without_labs() {
        let q = ComplexCaseQuery {
            medications: vec!["metformin".into(), "lisinopril".into()],
            age: 65,
            ..ComplexCaseQuery::default()
        };
        let p = complex_prompt(&q);
        assert!(p.contains("- Age: 65 years old"));
        assert!(p.contains("- Current medications: metformin, lisinopril"));
        assert!(p.contains("- Medical conditions: None reported"));
        assert!(!p.contains("Lab values"));
        assert!(!p.contains("Additional context"));
    }

    #[test]
    fn test_complex_prompt_with_labs_in_key_order() {
        let mut q = ComplexCaseQuery {
            medications: vec!["warfarin".into()],
            age: 78,
            conditions: vec!["atrial fibrillation".into(), "GERD".into()],
            additional_context: "recent fall".into(),
            ..ComplexCaseQuery::default()
        };
        q.lab_values.insert("INR".into(), "3.2".into());
        q.lab_values.insert("CrCl".into(), "45 mL/min".into());

        let p = complex_prompt(&q);
        assert!(p.contains("- Medical conditions: atrial fibrillation, GERD"));
        assert!(p.contains("- Lab values: CrCl: 45 mL/min, INR: 3.2"));
        assert!(p.contains("- Additional context: recent fall"));
    }
}
