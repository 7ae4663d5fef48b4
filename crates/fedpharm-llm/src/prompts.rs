//! Prompt templates for the intelligence suite and chat summaries.

pub const ADMET_PROMPT: &str = "You are a biomedical AI assistant. For a novel drug compound \
conceptually similar to Aspirin (acetylsalicylic acid), generate a mock ADMET (Absorption, \
Distribution, Metabolism, Excretion, Toxicity) profile. Present the information in a structured \
format with clear headings. Include plausible but fictional values for key metrics like: Oral \
Bioavailability (%), Plasma Protein Binding (%), BBB Permeability (High/Low), and LD50 (mg/kg).";

pub const KNOWLEDGE_PROMPT: &str = "You are a biomedical research AI. For a novel drug compound, \
let's call it 'FedPharm-24', which is a fictional NSAID similar to Ibuprofen, act as a Literature \
Knowledge Miner. Provide a brief summary containing the following sections: '### Similar \
Compounds' (list 3 real, related compounds), '### Potential Citations' (list 2 mock PubMed \
citation IDs in the format PMID: XXXXXXXX), and '### FDA Approval Status' (provide a plausible \
but fictional status like 'Phase II Clinical Trials'). Use markdown for headers.";

const SUMMARY_PREAMBLE: &str = "You are an AI assistant for FedPharm-X, a federated drug \
discovery platform. Your task is to summarize the following conversation between scientific \
collaborators.

The summary should be concise, well-structured, and use markdown for formatting. It must \
highlight the following key areas:
- **Key Findings & Data Points**: Important results, measurements, or data files mentioned.
- **Decisions Made**: Any clear decisions agreed upon by the team.
- **Action Items**: Explicit tasks assigned to collaborators (use role names).
- **Open Questions**: Any unresolved questions or topics for future discussion.

If a category has no relevant information, omit it.";

/// Summary prompt wrapping a `Name: message` transcript.
pub fn summary_prompt(transcript: &str) -> String {
    format!("{SUMMARY_PREAMBLE}\n\nConversation History:\n---\n{transcript}\n---\n\nSummary:")
}
