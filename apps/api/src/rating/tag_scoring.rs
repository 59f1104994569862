//! Tag Scorer: rule-based genre/tag alignment, no network.

use std::collections::HashSet;

use tracing::debug;

use crate::rating::models::ComponentScore;

const MIN_TAG_COUNT: usize = 10;
const MIN_GENRE_TAG_MATCHES: usize = 5;

const ENOUGH_TAGS: &str = "You have at least 10 tags which should increase search visibility.";
const TOO_FEW_TAGS: &str = "Consider adding more than 10 tags. You should have anywhere from 15-25 tags for optimal visibility results.";
const TAGS_ALIGNED: &str = "Your tags seem to align with your genre.";
const TAGS_NOT_ALIGNED: &str = "Consider adding more tags that align with your genre.";

/// Known genres (lower-case) and the tag vocabulary expected for each.
pub static GENRE_TAGS: &[(&str, &[&str])] = &[
    (
        "action",
        &[
            "action", "hack and slash", "hack-and-slash", "beat 'em up", "brawler", "fighting",
            "martial arts", "third-person", "melee combat", "spectacle fighter",
            "character action game", "sword fighting", "gun fu", "bullet time", "combo-based",
            "fast-paced", "reflex-based", "hand-to-hand combat", "weapon-based fighter",
            "arena combat", "action-adventure", "parkour", "quick time events", "qte",
            "cinematic action", "stealth action", "assassin", "ninja", "samurai",
        ],
    ),
    (
        "adventure",
        &[
            "adventure", "exploration", "story-rich", "point-and-click", "narrative",
            "choice matter", "interactive fiction", "text-based", "walking simulator",
            "visual novel", "puzzle-adventure", "hidden object", "escape room", "mystery",
            "detective", "thriller", "horror adventure", "survival horror", "psychological horror",
            "adventure rpg", "action-adventure", "open world adventure", "historical adventure",
            "sci-fi adventure", "fantasy adventure", "episodic", "story-driven",
            "branching narrative", "multiple endings", "time travel", "archaeology",
            "treasure hunting",
        ],
    ),
    (
        "strategy",
        &[
            "strategy", "turn-based", "turn based", "real-time strategy", "rts", "4x",
            "grand strategy", "tower defense", "auto battler", "tactical", "wargame", "card game",
            "deck-building", "moba", "base-building", "city-builder", "resource management",
            "economy", "diplomacy", "political", "historical", "military", "battle simulator",
            "tactics", "squad-based tactics", "hero collector", "multiplayer online battle arena",
            "tower offense", "defense", "automation", "programming", "hacking", "cyberpunk",
            "space strategy", "naval", "trading",
        ],
    ),
    (
        "rpg",
        &[
            "rpg", "role playing", "role-playing", "action rpg", "jrpg", "crpg", "party-based",
            "turn-based rpg", "open world", "character customization", "dungeon crawler",
            "building", "farming", "western rpg", "sandbox rpg", "tactical rpg", "roguelike rpg",
            "action-adventure rpg", "mmorpg", "online rpg", "story-rich rpg", "choice matter",
            "multiple endings", "class-based", "skill tree", "leveling system", "loot-based",
            "crafting", "alchemy", "magic system", "fantasy rpg", "sci-fi rpg",
            "post-apocalyptic rpg", "cyberpunk rpg", "steampunk rpg", "historical rpg",
            "medieval rpg",
        ],
    ),
    (
        "simulation",
        &[
            "simulation", "life sim", "farm sim", "management", "tycoon", "business sim",
            "dating sim", "social sim", "space sim", "flight sim", "train sim", "truck sim",
            "cooking sim", "city-builder", "pet sim", "animal sim", "medical sim", "surgery sim",
            "sports management", "political sim", "war sim", "ecosystem sim", "physics sim",
            "vehicle sim", "driving sim", "racing sim", "sailing sim", "submarine sim",
            "economy sim", "government sim", "colony sim", "survival sim", "crafting sim",
            "building sim", "automation sim", "factory sim", "agriculture sim", "biology sim",
        ],
    ),
    (
        "sports",
        &[
            "sports", "football", "soccer", "basketball", "baseball", "golf", "tennis",
            "wrestling", "extreme sports", "team sports", "sports management", "olympics",
            "hockey", "ice hockey", "volleyball", "beach volleyball", "cricket", "rugby",
            "american football", "boxing", "mma", "martial arts", "skateboarding", "snowboarding",
            "skiing", "surfing", "bmx", "cycling", "athletics", "track and field", "swimming",
            "diving", "gymnastics", "billiards", "pool", "snooker", "darts", "bowling",
            "table tennis", "ping pong", "badminton", "lacrosse", "water sports",
        ],
    ),
    (
        "racing",
        &[
            "racing", "car racing", "motorcycle racing", "offroad", "racing sim", "kart racing",
            "arcade racing", "rally", "drag racing", "motocross", "formula racing",
            "stock car racing", "street racing", "futuristic racing", "bike racing", "boat racing",
            "jet ski racing", "hovercraft racing", "racing management", "time attack",
            "drift racing", "demolition derby", "truck racing", "buggy racing", "atv racing",
            "snowmobile racing", "racing rpg", "open world racing", "racing strategy",
        ],
    ),
    (
        "puzzle",
        &[
            "puzzle", "logic", "physics puzzle", "match-3", "hidden object", "escape room",
            "jigsaw puzzle", "sudoku", "word game", "programming puzzle", "block-pushing puzzle",
            "sliding puzzle", "pattern recognition", "memory puzzle", "math puzzle", "riddle",
            "maze", "sokoban", "bridge-building", "contraption-builder", "puzzle platformer",
            "puzzle-adventure", "casual puzzle", "bubble shooter", "tile-matching", "tangram",
            "crossword", "logic grid", "picross", "nonogram", "cryptogram", "anagram",
            "spatial reasoning", "color matching", "connect the dots", "pipe connecting",
        ],
    ),
    (
        "arcade",
        &[
            "arcade", "retro", "classic", "score attack", "endless runner", "rhythm", "music game",
            "pinball", "breakout", "shoot 'em up", "bullet hell", "side-scroller", "beat 'em up",
            "fighting game", "light gun", "rail shooter", "maze game", "platformer",
            "twin-stick shooter", "fixed shooter", "puzzle bobble", "tetris-like", "pong-like",
            "pac-man-like", "space invaders-like", "galaga-like", "donkey kong-like",
            "frogger-like", "centipede-like", "asteroids-like", "defender-like", "joust-like",
            "qbert-like", "dig dug-like", "bubble bobble-like", "rampage-like", "gauntlet-like",
        ],
    ),
    (
        "platformer",
        &[
            "platformer", "2d platformer", "3d platformer", "metroidvania", "run and gun",
            "precision platformer", "puzzle platformer", "action platformer",
            "cinematic platformer", "physics-based platformer", "endless platformer",
            "roguelike platformer", "auto-runner", "side-scroller", "exploration platformer",
            "collectathon", "mascot platformer", "parkour platformer", "stealth platformer",
            "speedrun platformer", "hardcore platformer", "platformer shooter", "platformer rpg",
            "co-op platformer", "competitive platformer", "wall-jumping", "double-jump",
            "grappling hook", "swinging mechanics",
        ],
    ),
    (
        "shooter",
        &[
            "shooter", "fps", "first-person shooter", "third-person shooter", "shmup",
            "shoot 'em up", "bullet hell", "tactical shooter", "arena shooter", "on-rails shooter",
            "battle royale", "hero shooter", "looter shooter", "cover shooter",
            "team-based shooter", "class-based shooter", "mil-sim", "arcade shooter",
            "vehicular combat", "space shooter", "zombie shooter", "survival shooter",
            "co-op shooter", "twin-stick shooter", "top-down shooter", "isometric shooter",
            "stealth shooter", "time-manipulation shooter", "retro shooter",
            "physics-based shooter", "sci-fi shooter", "realistic shooter", "western shooter",
        ],
    ),
    (
        "visual novel",
        &[
            "visual novel", "otome", "kinetic novel", "dating sim", "choice matter",
            "multiple endings", "romance", "interactive fiction", "text-based", "story-rich",
            "branching narrative", "character-driven", "dialogue-heavy", "slice of life",
            "mystery visual novel", "horror visual novel", "sci-fi visual novel",
            "fantasy visual novel", "historical visual novel", "psychological", "drama", "comedy",
            "thriller", "supernatural", "school life", "coming of age", "adult", "all-ages",
            "boys' love", "girls' love", "harem", "reverse harem", "episodic",
        ],
    ),
    (
        "tabletop",
        &[
            "tabletop", "board game", "card game", "dice", "chess", "gambling", "tabletop rpg",
            "collectible card game", "deck-building", "miniatures", "tile-placement",
            "worker placement", "area control", "strategy board game", "party game",
            "social deduction", "hidden role", "cooperative board game", "legacy board game",
            "eurogame", "ameritrash", "abstract strategy", "wargame", "roll and write", "auction",
            "drafting", "push your luck", "real-time", "dexterity", "memory", "word game",
            "trivia", "escape room game", "dungeon crawler",
        ],
    ),
    (
        "roguelike",
        &[
            "roguelike", "roguelite", "rogue-like", "rogue-lite", "procedural generation",
            "permadeath", "dungeon crawler", "run-based", "randomized", "character progression",
            "meta-progression", "replayability", "turn-based roguelike", "real-time roguelike",
            "action roguelike", "strategy roguelike", "rpg roguelike", "shooter roguelike",
            "platformer roguelike", "card roguelike", "survival roguelike", "mystery dungeon",
            "traditional roguelike", "coffee break roguelike", "ascii roguelike",
            "tactical roguelike", "deck-building roguelike", "roguelike-metroidvania",
            "bullet hell roguelike",
        ],
    ),
    (
        "sandbox",
        &[
            "sandbox", "open world", "crafting", "building", "voxel", "physics", "creative",
            "exploration", "survival", "procedural generation", "terraforming", "base-building",
            "resource management", "life simulation", "social simulation", "player-driven economy",
            "player-created content", "mod support", "multiplayer sandbox", "virtual world",
            "space sandbox", "historical sandbox", "fantasy sandbox", "sci-fi sandbox",
            "post-apocalyptic sandbox", "crime sandbox", "medieval sandbox", "western sandbox",
            "underwater sandbox", "playground", "simulation sandbox", "sandbox rpg",
        ],
    ),
    (
        "education",
        &[
            "education", "educational", "learning", "science", "math", "language learning",
            "history", "geography", "programming", "typing", "quiz", "puzzle", "brain training",
            "memory", "logic", "problem-solving", "critical thinking", "creativity", "art",
            "music education", "physics simulation", "chemistry", "biology", "anatomy",
            "astronomy", "geology", "environmental", "social studies", "economics",
            "political science", "psychology", "philosophy", "literature", "grammar", "vocabulary",
            "foreign language", "sign language", "coding for kids",
        ],
    ),
    (
        "indie",
        &[
            "indie", "experimental", "artistic", "minimalist", "pixel graphics", "hand-drawn",
            "stylized", "atmospheric", "surreal", "abstract", "quirky", "unique", "innovative",
            "niche", "cult classic", "short", "casual", "story-rich", "emotional",
            "thought-provoking", "philosophical", "political", "social commentary", "indie rpg",
            "indie platformer", "indie puzzle", "indie adventure", "indie horror",
            "indie strategy", "indie simulation", "indie roguelike", "indie multiplayer",
            "indie co-op", "indie sandbox",
        ],
    ),
];

/// Looks up the expected tag vocabulary for a genre, case-insensitively.
pub fn genre_vocabulary(genre: &str) -> Option<&'static [&'static str]> {
    let genre = genre.trim().to_lowercase();
    GENRE_TAGS
        .iter()
        .find(|(name, _)| *name == genre)
        .map(|(_, tags)| *tags)
}

/// Scores tags on the 0–5 raw scale: +1 for at least ten tags, +4 when at least five tags
/// are themselves known genres (otherwise +2).
pub fn score(genres: &[String], tags: &[String]) -> ComponentScore {
    let expected: HashSet<&str> = genres
        .iter()
        .filter_map(|g| genre_vocabulary(g))
        .flat_map(|vocab| vocab.iter().copied())
        .collect();

    let lowered: Vec<String> = tags.iter().map(|t| t.trim().to_lowercase()).collect();
    let genre_matches = lowered
        .iter()
        .filter(|t| genre_vocabulary(t).is_some())
        .count();
    let vocabulary_matches = lowered
        .iter()
        .filter(|t| expected.contains(t.as_str()))
        .count();

    debug!(
        tags = tags.len(),
        genre_matches, vocabulary_matches, "Scoring page tags"
    );

    let mut raw = 0.0;
    let mut strengths = Vec::new();
    let mut feedback = Vec::new();

    if tags.len() >= MIN_TAG_COUNT {
        raw += 1.0;
        strengths.push(ENOUGH_TAGS);
    } else {
        feedback.push(TOO_FEW_TAGS);
    }

    if genre_matches >= MIN_GENRE_TAG_MATCHES {
        raw += 4.0;
        strengths.push(TAGS_ALIGNED);
    } else {
        raw += 2.0;
        feedback.push(TAGS_NOT_ALIGNED);
    }

    ComponentScore {
        raw,
        actionable_feedback: feedback.join(" "),
        strengths: strengths.join(" "),
    }
}
