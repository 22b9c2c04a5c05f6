//! Oracle prompt text for each funnel stage

use crate::types::{ExtractionKind, FunnelStage, Prompt};

const ROLE: &str = "You assist with classifying goods under the Harmonized Tariff Schedule of the \
United States (HTS). U.S. Customs and Border Protection uses the HTS to decide which duties apply \
to imported goods. Given a product description, you help find the HTS code it belongs under.";

const JUDGEMENT: &str = "When weighing a code, ask:
- Would someone plausibly describe the product this way if it belonged under this code?
- Which kinds of goods are most commonly imported?
- What could the product be used for? Use can move a product into a different code than its \
description alone suggests.

Take the product as described, but keep a code in play if you can argue reasonably that it fits.";

pub fn chapter_select(description: &str, chapter_listing: &str) -> Prompt {
    Prompt {
        stage: FunnelStage::ChapterSelect,
        system: Some(format!(
            "{ROLE} The first step is deciding which chapters to search.

Chapters and their descriptions:

{chapter_listing}

Pick the 3 most likely chapters and explain your reasoning. This is the first step, so keep the \
search broad: choose at least 3 chapters."
        )),
        user: format!(
            "From the chapters listed, choose the 3 most likely chapters to search for this \
product: {description}."
        ),
    }
}

pub fn short_code_select(description: &str, chapter_response: &str, candidates: &str) -> Prompt {
    Prompt {
        stage: FunnelStage::ShortCodeSelect,
        system: Some(format!(
            "{ROLE}

A colleague already chose the most likely chapters for this product:
{description}

Their conclusion: {chapter_response}

Codes within those chapters:

{candidates}

Choose up to 6 of the most likely codes.

{JUDGEMENT}"
        )),
        user: format!("Choose up to 6 of the most likely HTS codes for this product: {description}."),
    }
}

pub fn full_code_select(description: &str, short_code_response: &str, candidates: &str) -> Prompt {
    Prompt {
        stage: FunnelStage::FullCodeSelect,
        system: Some(format!(
            "{ROLE}

A colleague already chose the most likely four digit codes for this product:
{description}

Their conclusion:

{short_code_response}

Now go one level deeper and choose full codes from these candidates:

{candidates}

{JUDGEMENT}
- Finally, look at the duty rates. An extra option only helps if its rate is lower. Do NOT \
choose options that are both less likely and more expensive."
        )),
        user: format!(
            "Choose the 6 most likely HTS codes for this product: {description}
You MUST choose 6 codes, even when unsure."
        ),
    }
}

pub fn final_select(description: &str, full_code_response: &str, candidates: &str) -> Prompt {
    Prompt {
        stage: FunnelStage::FinalSelect,
        system: None,
        user: format!(
            "{ROLE}

A colleague already chose the 6 most likely codes for this product:
{description}.

Their conclusion:

{full_code_response}

Details of the codes they chose:
{candidates}

Now pick the single most likely final code.

Consider:
- Which kinds of goods are most commonly imported?
- If the description does not mention an attribute, how likely is the product to have it? If not \
very likely, prefer an \"other\" bucket within the broader category.
- How easily could the product be confused with a neighbouring category? Someone describing a \
\"screw\" may really have a bolt or a nut; someone describing a drinking glass is very unlikely \
to have a flower vase.
- What could the product be used for?

Then pick one more code: the next most likely code whose duty rate is strictly lower than the \
first. If its rate is equal or higher, skip it and move on to the next most likely.

Return most_likely_code and most_likely_lower_rate_code."
        ),
    }
}

/// Instruction for pulling the selected codes out of a free-form answer
pub fn extraction(kind: ExtractionKind, response: &str) -> String {
    let (what, shape, count) = match kind {
        ExtractionKind::Chapters => ("HTS chapters", "two digit numbers such as 01, 02 or 03", "3 chapters"),
        ExtractionKind::ShortCodes => ("four digit HTS codes", "four digit numbers such as 0101, 2345 or 0390", "up to 6 codes"),
        ExtractionKind::FullCodes => (
            "full HTS codes",
            "dotted ten digit numbers such as 0101.21.00.10",
            "up to 6 codes",
        ),
    };

    format!(
        "Read the answer below and list the {what} it selects. They are {shape}. \
List only the final selection; skip passing references such as \"I looked at 10 through 20\".
The answer selects {count}. Put them in the list: {response}"
    )
}
