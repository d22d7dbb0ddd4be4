//! Synthesis prompt assembly. The contract is fixed (identity block,
//! attributed snippets in reliability order, rumor separation, the
//! null-rather-than-fabricate rule, JSON-only output); the wording is not.

use epilogue_model::{Actor, RawSourceSnippet};

pub const SYNTHESIS_SYSTEM: &str =
    "You fuse source material about a deceased actor into one structured record. \
     Prefer higher-reliability sources when they conflict. Keep verified facts and \
     rumors strictly separate. Cite the source name inline where practical, e.g. \
     (per Variety). Never invent a fact: a field you cannot support is null.";

/// Assemble the user prompt. Snippets must already be in reliability
/// order; their position becomes the source number cited back to us.
pub fn build_prompt(actor: &Actor, snippets: &[RawSourceSnippet]) -> String {
    let mut prompt = String::with_capacity(4_096);

    prompt.push_str(&format!("Subject: {}\n", actor.name));
    if let Some(birthday) = actor.birthday {
        prompt.push_str(&format!("Born: {birthday}\n"));
    }
    if let Some(deathday) = actor.deathday {
        prompt.push_str(&format!("Died: {deathday}\n"));
    }
    if let Some(place) = &actor.place_of_birth {
        prompt.push_str(&format!("Place of birth: {place}\n"));
    }

    prompt.push_str("\nSource material, most reliable first:\n");
    for (index, snippet) in snippets.iter().enumerate() {
        let attr = &snippet.attribution;
        prompt.push_str(&format!(
            "\n[{n}] {source} (reliability {tier}",
            n = index + 1,
            source = attr.source_type.as_str(),
            tier = attr.tier.as_str(),
        ));
        if let Some(publication) = &attr.meta.publication {
            prompt.push_str(&format!(", {publication}"));
        }
        if let Some(url) = &attr.meta.url {
            prompt.push_str(&format!(", {url}"));
        }
        prompt.push_str(")\n");
        prompt.push_str(&snippet.payload.text());
        prompt.push('\n');
    }

    prompt.push_str(
        "\nProduce one JSON object with exactly these fields:\n\
         {\n\
           \"circumstances\": string|null,          // verified death circumstances, prose\n\
           \"rumored_circumstances\": string|null,  // rumors only, clearly unverified\n\
           \"location_of_death\": string|null,\n\
           \"cause_confidence\": \"high\"|\"medium\"|\"low\"|null,\n\
           \"details_confidence\": \"high\"|\"medium\"|\"low\"|null,\n\
           \"birthday_confidence\": \"high\"|\"medium\"|\"low\"|null,\n\
           \"deathday_confidence\": \"high\"|\"medium\"|\"low\"|null,\n\
           \"notable_factors\": [string],           // only from: overdose, suicide, accident, homicide, rare_disease, young_death, on_set_death, poverty, addiction, mysterious_circumstances, controversy, career_decline, comeback, posthumous_fame\n\
           \"last_project\": string|null,\n\
           \"posthumous_releases\": [string],\n\
           \"career_status_at_death\": string|null,\n\
           \"related_celebrities\": [string],\n\
           \"related_deaths\": string|null,\n\
           \"narrative\": string|null               // long-form biography when the material supports one\n\
         }\n\
         Respond with the JSON object only. Use null rather than guessing.",
    );

    prompt
}
