//! Per-mode UI copy and quick-prompt suggestions

use super::mode::Mode;

const KID_SUGGESTIONS: &[&str] = &[
    "🌱 Plants and sunlight",
    "🧲 Magnets are cool!",
    "🌈 Rainbow colors",
    "🦋 Bug habitats",
    "💧 Water experiments",
    "🚗 Ramps and cars",
    "🍎 Food science",
    "🧼 Soap and bubbles",
    "🌪️ Weather fun",
    "🔋 Simple machines",
    "🦷 Tooth experiments",
    "🧠 Five senses",
];

const PARENT_SUGGESTIONS: &[&str] = &[
    "📋 Science fair timeline",
    "📝 Project documentation",
    "🏆 Judging criteria",
    "🧪 Safe experiments",
    "📊 Data visualization",
    "📣 Presentation tips",
    "🛒 Budget-friendly ideas",
    "❓ Scientific method",
    "📚 Research sources",
    "🧮 Age-appropriate math",
    "🖼️ Display board tips",
    "📱 Technology integration",
];

const KID_WELCOME: &str = "# Hello, future scientist! 👋🔬

I'm **Professor Atom**, and I'm SUPER excited to help you with your Hackett Elementary Science Fair project! 🚀

Science is like being a detective who solves nature's mysteries! ✨ We're going to:

1. Ask awesome questions ❓
2. Make cool guesses 🤔
3. Test our ideas with experiments 🧪
4. Write down what happens 📝
5. Figure out what it all means! 🧠

What kind of science stuff are you interested in? Plants? 🌱 Animals? 🐾 Weather? 🌦️ Space? 🪐 Tell me what you're curious about, and we'll start exploring together!

Remember - real scientists don't know all the answers... they just know how to find them! 🔍";

const PARENT_WELCOME: &str = "# Welcome to the Science Fair Parent Support Center

Thank you for helping your child navigate their science fair journey at Hackett Elementary. My name is Dr. Morgan, and I'm here to provide guidance that helps you support your young scientist while fostering their independence and critical thinking skills.

The elementary school science fair is about:
- Developing curiosity and scientific thinking 🧠
- Learning the scientific method through hands-on experience 🔍
- Building confidence in problem-solving abilities 💪
- Creating documentation and presentation skills 📊

What aspect of the science fair process would you like guidance on? Are you looking for project ideas, timeline planning, materials assistance, or strategies to support without taking over?";

const KID_SIDEBAR_INTRO: &str = "Hi there, young scientist! 👋

I'm here to help you:
- 🔎 Find a cool science question
- 🤔 Make a guess (that's a hypothesis!)
- 🧪 Test your ideas with experiments
- 📝 Record what happens
- 🎯 Figure out what it all means

I won't give you the answers - that's YOUR job as a scientist! But I'll help you discover them yourself! 🚀";

const PARENT_SIDEBAR_INTRO: &str = "Welcome to the parent support section. Here you'll find:

- 📅 Timeline management tips
- 🧠 Age-appropriate guidance
- 🔍 How to ask guiding questions
- 📊 Documentation strategies
- 🏆 Science fair preparation help

Our goal is to help you support your child's learning journey while fostering independence and scientific thinking.";

const KID_GUIDE: &[&str] = &[
    "Ask a question ❓",
    "Make a guess (hypothesis) 🤔",
    "Test with an experiment 🧪",
    "Record what happens 📝",
    "Share what you learned! 🌟",
];

const PARENT_GUIDE: &[&str] = &[
    "Choose age-appropriate topic",
    "Guide question formulation",
    "Help gather materials safely",
    "Assist with documentation",
    "Support independence",
    "Practice presentation",
    "Prepare display board",
];

const FOOTER: &str = "Hackett Elementary School Science Fair";

/// Side panel copy: intro, a short reference list, footer tagline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SidebarCopy {
    pub heading: &'static str,
    pub intro: &'static str,
    pub guide_title: &'static str,
    /// Numbered steps in Kid mode, a checklist in Parent mode
    pub guide_items: &'static [&'static str],
    pub footer: &'static str,
}

/// Display copy the chat UI shows for one mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersonaProfile {
    pub mode: Mode,
    pub persona_name: &'static str,
    pub title: &'static str,
    /// Shown while the transcript is empty; never part of the history
    pub welcome_message: &'static str,
    pub input_placeholder: &'static str,
    /// Shown while a reply is pending
    pub pending_label: &'static str,
    pub suggestions: &'static [&'static str],
    pub sidebar: SidebarCopy,
}

const KID_PROFILE: PersonaProfile = PersonaProfile {
    mode: Mode::Kid,
    persona_name: "Professor Atom",
    title: "🔬 Science Explorer Bot for Kids! 🚀",
    welcome_message: KID_WELCOME,
    input_placeholder: "What's your science question? 🔍",
    pending_label: "Thinking of science ideas...",
    suggestions: KID_SUGGESTIONS,
    sidebar: SidebarCopy {
        heading: "Meet Professor Atom! 🧪",
        intro: KID_SIDEBAR_INTRO,
        guide_title: "🔍 Scientific Method",
        guide_items: KID_GUIDE,
        footer: FOOTER,
    },
};

const PARENT_PROFILE: PersonaProfile = PersonaProfile {
    mode: Mode::Parent,
    persona_name: "Dr. Morgan",
    title: "🔬 Science Fair Parent Support",
    welcome_message: PARENT_WELCOME,
    input_placeholder: "How can I help with your child's science fair project?",
    pending_label: "Researching educational approaches...",
    suggestions: PARENT_SUGGESTIONS,
    sidebar: SidebarCopy {
        heading: "Parent Resource Center 📚",
        intro: PARENT_SIDEBAR_INTRO,
        guide_title: "📋 Science Fair Checklist",
        guide_items: PARENT_GUIDE,
        footer: FOOTER,
    },
};

pub fn profile_for(mode: Mode) -> &'static PersonaProfile {
    match mode {
        Mode::Kid => &KID_PROFILE,
        Mode::Parent => &PARENT_PROFILE,
    }
}

/// Fixed, ordered quick prompts for a mode
pub fn suggestions_for(mode: Mode) -> &'static [&'static str] {
    profile_for(mode).suggestions
}
