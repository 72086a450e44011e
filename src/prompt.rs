//! Instruction texts sent to the language model

use crate::persona::{ADVERTISED_PERSONAS, Persona};

/// Reminder appended to every instruction block
const DELIVERY_RULES: &str = "Keep responses SHORT (1-2 sentences). NEVER use asterisks, brackets or \
action descriptions like *clears throat* or [squints]. Just speak naturally.";

/// Instructions the assistant starts with, before any persona is applied
#[must_use]
pub fn base_instructions() -> String {
    format!(
        "You are a helpful voice AI assistant for user testing simulation.\n\n\
         Users can ask you to roleplay as different personas by saying \"Talk to [Persona Name]\".\n\n\
         Available personas: {}\n\n\
         IMPORTANT: {DELIVERY_RULES}",
        ADVERTISED_PERSONAS.join(", ")
    )
}

/// Generic instructions used when switching back to the default persona
#[must_use]
pub fn default_instructions() -> String {
    format!("You are a helpful voice AI assistant for user testing simulation. {DELIVERY_RULES}")
}

/// Role-play instructions for a persona
///
/// The sentinel default persona gets [`default_instructions`] instead: it
/// never carries backstory or roast-style framing.
#[must_use]
pub fn persona_instructions(persona: &Persona) -> String {
    if persona.is_default() {
        return default_instructions();
    }

    format!(
        "You are now roleplaying as {name}.\n\n\
         BACKSTORY: {backstory}\n\n\
         ROAST STYLE: {roast_style}\n\n\
         Stay in character. React to product ideas as this persona would.\n\
         Be brutally honest and entertaining. {DELIVERY_RULES}",
        name = persona.name,
        backstory = persona.backstory,
        roast_style = persona.roast_style,
    )
}

/// One-off instructions for the opening greeting
#[must_use]
pub fn greeting_instructions() -> String {
    let featured = ADVERTISED_PERSONAS
        .iter()
        .take(3)
        .copied()
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Introduce yourself as Toast, a User Testing Simulator! \
         Tell them you can roleplay as different personas to help test their product ideas. \
         Mention a few available personas: {featured}. \
         Ask them which persona they'd like to talk to, or what product idea they want to test. \
         Keep it brief, friendly, and enthusiastic."
    )
}

/// One-off instructions for the in-character introduction after a switch
#[must_use]
pub fn introduction_instructions(persona: &Persona) -> String {
    format!(
        "You just became {}. \
         Introduce yourself VERY briefly in character (one short sentence). \
         Then ask what product they want you to test. \
         Stay in character!",
        persona.name
    )
}
