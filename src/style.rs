//! Writing styles the pipeline can target.
//!
//! Each style carries the system prompt used for every request made on
//! behalf of a novel in that style.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Enumerated genre/tone categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WritingStyle {
    Children,
    Fantasy,
    MartialArts,
    Romance,
    Scifi,
    Mystery,
    Horror,
    Historical,
    Literary,
    Thriller,
    Satire,
    Adventure,
    YoungAdult,
    Biography,
    Dystopian,
    MagicalRealism,
    Crime,
    Western,
    Poetry,
    Drama,
    Essay,
    FairyTale,
    PostApocalyptic,
    Supernatural,
    Gothic,
}

/// Static description of a style.
struct StyleInfo {
    key: &'static str,
    name: &'static str,
    description: &'static str,
    /// Style-specific craft guidance appended to the shared system prompt.
    craft: &'static str,
}

impl WritingStyle {
    /// All styles in presentation order.
    pub const ALL: [WritingStyle; 25] = [
        WritingStyle::Children,
        WritingStyle::Fantasy,
        WritingStyle::MartialArts,
        WritingStyle::Romance,
        WritingStyle::Scifi,
        WritingStyle::Mystery,
        WritingStyle::Horror,
        WritingStyle::Historical,
        WritingStyle::Literary,
        WritingStyle::Thriller,
        WritingStyle::Satire,
        WritingStyle::Adventure,
        WritingStyle::YoungAdult,
        WritingStyle::Biography,
        WritingStyle::Dystopian,
        WritingStyle::MagicalRealism,
        WritingStyle::Crime,
        WritingStyle::Western,
        WritingStyle::Poetry,
        WritingStyle::Drama,
        WritingStyle::Essay,
        WritingStyle::FairyTale,
        WritingStyle::PostApocalyptic,
        WritingStyle::Supernatural,
        WritingStyle::Gothic,
    ];

    /// Style used when neither the caller nor the model picks a valid one.
    pub const DEFAULT: WritingStyle = WritingStyle::Fantasy;

    fn info(self) -> StyleInfo {
        match self {
            WritingStyle::Children => StyleInfo {
                key: "children",
                name: "Children's Literature",
                description: "Simple, warm and full of wonder, with gentle lessons for young readers.",
                craft: "Use simple vocabulary and rhythm, playful humor, relatable young heroes and a hopeful tone. Teach through the story, never by lecturing.",
            },
            WritingStyle::Fantasy => StyleInfo {
                key: "fantasy",
                name: "Fantasy",
                description: "Magic, invented worlds, quests and mystery.",
                craft: "Build an internally consistent world with its own rules of magic. Balance epic scope with intimate character moments and evocative description.",
            },
            WritingStyle::MartialArts => StyleInfo {
                key: "martial-arts",
                name: "Martial Arts",
                description: "Warriors, sects and codes of honor in the martial world.",
                craft: "Write fluid, vivid fight scenes and bonds between masters, disciples and rivals. Explore honor, loyalty and inner discipline.",
            },
            WritingStyle::Romance => StyleInfo {
                key: "romance",
                name: "Romance",
                description: "Emotional relationships and the tension between characters.",
                craft: "Give both leads rich inner lives. Show feeling through gesture and detail, and let obstacles grow out of who the characters are.",
            },
            WritingStyle::Scifi => StyleInfo {
                key: "scifi",
                name: "Science Fiction",
                description: "Future technology and its consequences, grounded in plausible science.",
                craft: "Keep the science plausible and in service of the human drama. Pose ethical questions through concrete situations.",
            },
            WritingStyle::Mystery => StyleInfo {
                key: "mystery",
                name: "Mystery",
                description: "Investigations, clues and secrets to uncover.",
                craft: "Plant fair clues and red herrings, keep the logic airtight and make the solution surprising yet inevitable.",
            },
            WritingStyle::Horror => StyleInfo {
                key: "horror",
                name: "Horror",
                description: "Dread, the uncanny and primal fear.",
                craft: "Build unease through small details and pacing. Make the fear personal to the characters and let tension breathe before release.",
            },
            WritingStyle::Historical => StyleInfo {
                key: "historical",
                name: "Historical Fiction",
                description: "Stories set against a carefully rendered past.",
                craft: "Ground every scene in period detail, custom and speech without losing the characters' immediacy.",
            },
            WritingStyle::Literary => StyleInfo {
                key: "literary",
                name: "Literary Fiction",
                description: "Character-driven stories with emphasis on language and theme.",
                craft: "Favor interiority, precise prose and layered themes. Let meaning emerge from character rather than plot mechanics.",
            },
            WritingStyle::Thriller => StyleInfo {
                key: "thriller",
                name: "Thriller",
                description: "High stakes, fast pacing and constant danger.",
                craft: "Open scenes late, end them on hooks, and keep raising the stakes. Every chapter should tighten the clock.",
            },
            WritingStyle::Satire => StyleInfo {
                key: "satire",
                name: "Satire",
                description: "Humor and exaggeration aimed at society and its follies.",
                craft: "Use irony and escalation with a clear target. Keep the absurd internally logical so the critique lands.",
            },
            WritingStyle::Adventure => StyleInfo {
                key: "adventure",
                name: "Adventure",
                description: "Journeys, exploration and daring feats.",
                craft: "Keep momentum high with vivid settings, physical challenges and companions who grow through the journey.",
            },
            WritingStyle::YoungAdult => StyleInfo {
                key: "young-adult",
                name: "Young Adult",
                description: "Coming-of-age stories about identity and first experiences.",
                craft: "Write in an authentic teenage voice with high emotional stakes, friendship, and the search for identity.",
            },
            WritingStyle::Biography => StyleInfo {
                key: "biography",
                name: "Biography",
                description: "A life told through its defining moments.",
                craft: "Shape a life into an arc, choosing revealing scenes and tracing how choices formed the person.",
            },
            WritingStyle::Dystopian => StyleInfo {
                key: "dystopian",
                name: "Dystopian",
                description: "Oppressive societies and those who resist them.",
                craft: "Reveal the system's rules through everyday life, and make resistance costly and personal.",
            },
            WritingStyle::MagicalRealism => StyleInfo {
                key: "magical-realism",
                name: "Magical Realism",
                description: "The marvelous woven quietly into ordinary life.",
                craft: "Present the magical matter-of-factly within a realistic world, and let it carry emotional or cultural meaning.",
            },
            WritingStyle::Crime => StyleInfo {
                key: "crime",
                name: "Crime Fiction",
                description: "Criminals, investigators and the moral grey between them.",
                craft: "Render the mechanics of the crime and the investigation credibly, and give every side a believable motive.",
            },
            WritingStyle::Western => StyleInfo {
                key: "western",
                name: "Western",
                description: "The frontier, its lawlessness and its codes.",
                craft: "Use spare, vivid landscape writing and laconic dialogue. Test characters against the land and each other.",
            },
            WritingStyle::Poetry => StyleInfo {
                key: "poetry",
                name: "Poetry",
                description: "Narrative told through lyrical, image-rich language.",
                craft: "Let imagery, rhythm and compression carry the story. Every line should earn its place.",
            },
            WritingStyle::Drama => StyleInfo {
                key: "drama",
                name: "Drama",
                description: "Conflict-driven stories centered on relationships and choices.",
                craft: "Drive scenes through dialogue and confrontation, and let characters reveal themselves under pressure.",
            },
            WritingStyle::Essay => StyleInfo {
                key: "essay",
                name: "Essay",
                description: "Reflective prose that explores an idea.",
                craft: "Combine personal observation with argument, moving from concrete detail to insight.",
            },
            WritingStyle::FairyTale => StyleInfo {
                key: "fairy-tale",
                name: "Fairy Tale",
                description: "Timeless tales of enchantment, trials and transformation.",
                craft: "Use the cadence of oral storytelling, archetypal characters, trials in threes, and a resonant moral core.",
            },
            WritingStyle::PostApocalyptic => StyleInfo {
                key: "post-apocalyptic",
                name: "Post-Apocalyptic",
                description: "Survival and hope after the collapse of civilization.",
                craft: "Make scarcity concrete, show what people keep and what they abandon, and let hope be hard-won.",
            },
            WritingStyle::Supernatural => StyleInfo {
                key: "supernatural",
                name: "Supernatural",
                description: "Ghosts, spirits and forces beyond the natural world.",
                craft: "Keep the supernatural rule-bound and eerie, intruding on ordinary lives with real consequences.",
            },
            WritingStyle::Gothic => StyleInfo {
                key: "gothic",
                name: "Gothic",
                description: "Decaying settings, buried secrets and brooding atmosphere.",
                craft: "Let setting mirror psychology, build suspense from secrets and the past, and keep the prose rich and shadowed.",
            },
        }
    }

    /// Stable identifier used on the command line and in prompts.
    pub fn key(self) -> &'static str {
        self.info().key
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn description(self) -> &'static str {
        self.info().description
    }

    /// System prompt for every request made for this style.
    pub fn system_prompt(self) -> String {
        let info = self.info();
        format!(
            "You are an acclaimed author of {}. {}\n\n\
             Write with vivid, specific detail, consistent characters and natural dialogue. \
             Always answer in the same language as the material you are given.",
            info.name, info.craft
        )
    }

    /// Comma-separated list of every key, for prompts and help text.
    pub fn key_list() -> String {
        Self::ALL
            .iter()
            .map(|s| s.key())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for WritingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Error for an unknown style name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown writing style '{0}'")]
pub struct UnknownStyle(pub String);

impl FromStr for WritingStyle {
    type Err = UnknownStyle;

    /// Accepts the key or the display name, ignoring case and separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        Self::ALL
            .iter()
            .copied()
            .find(|style| normalize(style.key()) == wanted || normalize(style.name()) == wanted)
            .ok_or_else(|| UnknownStyle(s.trim().to_string()))
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
