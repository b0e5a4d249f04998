//! Outbound message text. All of it is English; localization happens at the
//! engine boundary.

use crate::classifier::{ClassificationResult, EvidenceSource, ReputationStatus, Verdict};
use crate::directory::{EXAMPLE_PROGRAMS, Program, ProgramLookup};
use crate::localization::Language;

pub const MAIN_MENU: &str = "Welcome to Federal Programs Info Service! 📊\n\n\
What would you like to do?\n\
1. 🔗 Verify a link safety\n\
2. ℹ️ Get program information\n\
3. 🌐 Change language\n\n\
Reply with 1, 2, or 3";

pub const LINK_PROMPT: &str = "🔗 Please paste the link you want to verify:\n\n\
Example: https://google.com\n\n\
Type 'menu' to go back";

pub const NEXT_LINK_PROMPT: &str = "🔗 Please paste the next link you want to verify:";

pub const PROGRAM_PROMPT: &str = "ℹ️ Please enter the program name:\n\n\
Examples:\n\
- N-Power\n\
- Anchor Borrowers\n\
- Conditional Cash Transfer\n\n\
Type 'menu' to go back";

pub const LANGUAGE_PROMPT: &str = "🌐 Choose your language:\n\n\
1. English\n\
2. Igbo\n\
3. Hausa\n\
4. Yoruba";

pub const INVALID_LANGUAGE_CHOICE: &str = "❌ Invalid choice. Please select 1, 2, 3, or 4";

pub const LINK_ACK: &str = "⏳ Analyzing your link... Please wait a moment.";

pub const PROGRAM_ACK: &str = "🔍 Searching for program information...";

pub const LINK_FOLLOWUP: &str = "What would you like to do next?\n\n\
1. Verify another link\n\
2. Get program info\n\
3. Main menu\n\n\
Or type 'menu' for main menu";

pub const ERROR_APOLOGY: &str = "❌ An error occurred. Returning to main menu.";

const SAFETY_TIPS: &str = "🛡️ Safety tips:\n\
- Government programs use official .gov.ng websites\n\
- Never pay a fee to register for a government program\n\
- Never share your BVN, PIN or passwords";

const SPELLING_REMINDER: &str =
    "💡 Always double-check the spelling of a web address before entering any details.";

pub fn language_set(language: Language) -> String {
    format!("✅ Language set to {}!", language.display_name())
}

/// Render a classification for the user. Severity sets the headline.
pub fn render_classification(result: &ClassificationResult) -> String {
    let mut sections: Vec<String> = Vec::new();

    let headline = match result.verdict {
        Verdict::Dangerous => format!(
            "🚨 DANGER: This link is flagged for {}!\nDo NOT open it. Avoid this link and do not enter any details.",
            result.primary_threat_type.label()
        ),
        Verdict::Suspicious => {
            "⚠️ CAUTION: This link looks suspicious.\nDo not enter passwords, BVN or bank details on this site."
                .to_string()
        }
        Verdict::Safe => "✅ This link appears safe.".to_string(),
        Verdict::LikelySafe => "✅ This link is likely safe.".to_string(),
        Verdict::Unknown if result.host.is_none() => {
            "❔ That doesn't look like a valid web address, so it could not be checked.".to_string()
        }
        Verdict::Unknown => "❔ We could not confirm whether this link is safe.".to_string(),
    };
    sections.push(format!("{headline}\n🔗 {}", result.url));

    if matches!(result.verdict, Verdict::Dangerous | Verdict::Suspicious) {
        let reasons: Vec<String> = result
            .evidence
            .iter()
            .filter(|e| match e.source {
                EvidenceSource::Heuristic => true,
                EvidenceSource::Reputation => !result.reputation.is_degraded(),
                _ => false,
            })
            .map(|e| format!("- {}", e.detail))
            .collect();
        if !reasons.is_empty() {
            sections.push(format!("Reasons:\n{}", reasons.join("\n")));
        }
    } else if let Some(stats) = result.stats {
        sections.push(format!(
            "📊 Security vendors: {} harmless, {} undetected",
            stats.harmless, stats.undetected
        ));
    }

    if let Some(program) = &result.matched_program {
        sections.push(format!(
            "🏛️ This domain belongs to the official program {} ({}).",
            program.name, program.agency
        ));
    }

    match &result.reputation {
        ReputationStatus::Submitted => sections.push(
            "🔄 This link was new to our scanner and has been submitted for analysis. Check back shortly."
                .to_string(),
        ),
        ReputationStatus::NotConfigured | ReputationStatus::Unavailable(_) => sections.push(
            "ℹ️ The link reputation service is unavailable right now. This result is based on local checks only."
                .to_string(),
        ),
        ReputationStatus::Checked | ReputationStatus::Skipped => {}
    }

    match result.verdict {
        Verdict::Safe | Verdict::LikelySafe => sections.push(SPELLING_REMINDER.to_string()),
        Verdict::Unknown => sections.push(SAFETY_TIPS.to_string()),
        Verdict::Suspicious | Verdict::Dangerous => {}
    }

    sections.join("\n\n")
}

/// Render a directory lookup.
pub fn render_program_lookup(query: &str, lookup: &ProgramLookup) -> String {
    match lookup {
        ProgramLookup::Found(program) => render_program(program),
        ProgramLookup::Multiple(programs) => {
            let lines: Vec<String> = programs
                .iter()
                .enumerate()
                .map(|(i, p)| format!("{}. {} ({})\n   🔗 {}", i + 1, p.name, p.sector, p.link))
                .collect();
            format!(
                "🔍 Found {} programs matching \"{query}\":\n\n{}\n\nChoose 2 from the menu and send the full name for details.",
                programs.len(),
                lines.join("\n")
            )
        }
        ProgramLookup::NotFound => {
            let examples: Vec<String> = EXAMPLE_PROGRAMS.iter().map(|n| format!("- {n}")).collect();
            format!(
                "❌ No program found matching \"{query}\".\n\nTry one of these:\n{}",
                examples.join("\n")
            )
        }
    }
}

fn render_program(program: &Program) -> String {
    let mut lines = vec![
        format!("ℹ️ *{}*", program.name),
        format!("🏢 Sector: {}", program.sector),
        format!("🏛️ Agency: {}", program.agency),
    ];
    if !program.level.is_empty() {
        lines.push(format!("📍 Level: {}", program.level));
    }
    lines.push(format!("🔗 Official link: {}", program.link));
    if let Some(description) = program.description.as_deref().filter(|d| !d.trim().is_empty()) {
        lines.push(String::new());
        lines.push(description.trim().to_string());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{AnalysisStats, ThreatType};

    fn result(verdict: Verdict, threat: ThreatType) -> ClassificationResult {
        let mut r = ClassificationResult::new("https://x.test".into(), Some("x.test".into()));
        r.absorb(verdict, threat);
        r
    }

    #[test]
    fn dangerous_says_avoid_and_names_threat() {
        let mut r = result(Verdict::Dangerous, ThreatType::Phishing);
        r.add_evidence(EvidenceSource::Reputation, "Engine: phishing");
        r.reputation = ReputationStatus::Checked;
        let text = render_classification(&r);
        assert!(text.starts_with("🚨"));
        assert!(text.contains("Avoid"));
        assert!(text.contains("phishing"));
        assert!(text.contains("- Engine: phishing"));
    }

    #[test]
    fn safe_includes_spelling_reminder_and_no_tips() {
        let mut r = result(Verdict::Safe, ThreatType::None);
        r.stats = Some(AnalysisStats {
            harmless: 70,
            undetected: 5,
            ..Default::default()
        });
        let text = render_classification(&r);
        assert!(text.starts_with("✅"));
        assert!(text.contains("spelling"));
        assert!(text.contains("70 harmless"));
        assert!(!text.contains("Safety tips"));
    }

    #[test]
    fn unknown_gives_tips_without_reassurance() {
        let mut r = result(Verdict::Unknown, ThreatType::None);
        r.reputation = ReputationStatus::Submitted;
        let text = render_classification(&r);
        assert!(text.contains("Safety tips"));
        assert!(text.contains("Check back shortly"));
        assert!(!text.contains("✅"));
    }

    #[test]
    fn degraded_reputation_is_disclosed() {
        let mut r = result(Verdict::Suspicious, ThreatType::SuspiciousOther);
        r.add_evidence(EvidenceSource::Heuristic, "suspicious keywords in link: login");
        r.add_evidence(
            EvidenceSource::Reputation,
            "reputation service unavailable (timed out); local checks only",
        );
        r.reputation = ReputationStatus::Unavailable("timed out".into());
        let text = render_classification(&r);
        assert!(text.contains("This result is based on local checks only"));
        assert!(text.contains("- suspicious keywords in link: login"));
        assert!(!text.contains("- reputation service unavailable"));
    }

    #[test]
    fn program_found_lists_details() {
        let program = Program::new("N-Power", "Social Investment", "FMHDS", "https://nasims.gov.ng")
            .with_description("Youth empowerment");
        let text = render_program_lookup("n-power", &ProgramLookup::Found(program));
        assert!(text.contains("N-Power"));
        assert!(text.contains("Sector: Social Investment"));
        assert!(text.contains("https://nasims.gov.ng"));
        assert!(text.contains("Level: Federal"));
        assert!(text.ends_with("Youth empowerment"));
    }

    #[test]
    fn program_not_found_suggests_examples() {
        let text = render_program_lookup("xyz", &ProgramLookup::NotFound);
        assert!(text.contains("\"xyz\""));
        for name in EXAMPLE_PROGRAMS {
            assert!(text.contains(name));
        }
    }

    #[test]
    fn language_confirmation_uses_display_name() {
        assert_eq!(language_set(Language::Yo), "✅ Language set to Yoruba!");
    }
}
