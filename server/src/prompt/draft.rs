use indoc::{formatdoc, indoc};
use lib_inbox::InventoryContext;

use crate::store::{BrandProfile, ToneProfile};

const NO_BRAND: &str = "No brand information available.";
const NO_RULES: &str = "No specific rules provided.";

const MATCHED_INSTRUCTIONS: &str = indoc! {"
    - If the customer is asking about products you have in inventory, provide the pricing naturally
    - For generic inquiries, show them what options are available
    - If quantities were mentioned, acknowledge them in your response"};

const UNMATCHED_INSTRUCTIONS: &str = indoc! {"
    - The customer is asking about products you don't currently have in stock or offer
    - Politely let them know you don't have those specific items available
    - Be helpful by suggesting they contact you for custom requests or alternative options
    - Don't make up products or prices - be honest about what you don't have"};

/// Everything the reply prompt is built from.
pub struct DraftPromptInput<'a> {
    pub tone: Option<&'a ToneProfile>,
    pub brand: &'a BrandProfile,
    pub inventory: &'a InventoryContext,
    pub sender_name: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
}

fn style_section(tone: Option<&ToneProfile>) -> String {
    let Some(tone) = tone else {
        return "Write in a warm, natural, conversational style.".to_string();
    };

    formatdoc! {"
        Here's how they typically write - match this natural style:
        - Their sentences are usually {length:.0} words long
        - They frequently use words like: {words}
        - They tend to be {style} in tone
        - They often express {emotion}",
        length = tone.communication_patterns.avg_sentence_length,
        words = tone.top_words(5).join(", "),
        style = tone.politeness_analysis.communication_style,
        emotion = tone.emotional_tone.dominant_emotion,
    }
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

pub fn draft_prompt(input: &DraftPromptInput) -> String {
    let inventory_instructions = if input.inventory.has_matches() {
        MATCHED_INSTRUCTIONS
    } else {
        UNMATCHED_INSTRUCTIONS
    };
    let name = input.sender_name;

    formatdoc! {"
        You are writing an email reply for a small business owner.

        {style}

        Their brand identity:
        {brand}
        {inventory}

        Business-Specific Rules (Include if relevant to the reply):
        {rules}

        INSTRUCTIONS:
        - If the email isn't asking about products, services, or business-related matters, just respond naturally in a friendly, conversational way
        - For business inquiries: Write a SHORT, helpful reply (2-3 sentences max) that sounds like a real person
        - Address the sender by name ({name}) in a natural way - use their name once, early in the email
        - Be direct and conversational - NO corporate fluff like \"greatly appreciated\" or \"we are here to help\"
        - Get straight to the point - if they want pricing, give pricing; if they want availability, confirm availability
        - Include specific numbers/totals when relevant (e.g., \"$40 for all 5\")
        - End with a simple question or clear next step
        - NEVER INCLUDE ANY CLOSING SIGNATURE OR SIGN OFF like Thanks or Best Regards or Warm Regards, that will be handled outside your response
        - Be conversational and match their tone
        {inventory_instructions}

        GOOD example: \"Hey {name}! We've got ear savers for $8 each, so $40 for all 5. Should I set those aside for you?\"

        —— Incoming email ——
        From: {name}
        Subject: {subject}
        Body: {body}
        ",
        style = style_section(input.tone),
        brand = or_default(&input.brand.brand_summary, NO_BRAND),
        inventory = input.inventory.text,
        rules = or_default(&input.brand.special_instructions, NO_RULES),
        subject = input.subject,
        body = input.body,
    }
}
