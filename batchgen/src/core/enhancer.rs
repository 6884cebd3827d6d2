//! Prompt enhancement from randomly drawn category phrases.

use super::random::{RandomSource, pick};
use super::types::{Category, CategoryToggles, ElementPool};

/// Marker placed ahead of all drawn phrases when explicit content is enabled.
pub const EXPLICIT_MARKER: &str = "uncensored";

/// Result of enhancing a base prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enhancement {
    /// Base prompt followed by the drawn phrases.
    pub prompt: String,
    /// Drawn phrases (marker first when enabled), joined with `", "`.
    pub elements: String,
    /// Marker plus the whole explicit pool when enabled, else empty.
    pub explicit: String,
}

/// Draw one phrase per enabled, non-empty category in [`Category::ORDER`] and
/// append them to `base`.
pub fn enhance_prompt<R: RandomSource + ?Sized>(
    rng: &mut R,
    base: &str,
    toggles: &CategoryToggles,
    pool: &ElementPool,
) -> Enhancement {
    let mut chosen: Vec<String> = Vec::new();
    if toggles.explicit {
        chosen.push(EXPLICIT_MARKER.to_string());
    }
    for category in Category::ORDER {
        if !toggles.is_enabled(category) {
            continue;
        }
        if let Some(phrase) = pick(rng, pool.phrases(category)) {
            let phrase = phrase.trim();
            if !phrase.is_empty() {
                chosen.push(phrase.to_string());
            }
        }
    }

    let elements = chosen.join(", ");
    let prompt = match (base.is_empty(), elements.is_empty()) {
        (_, true) => base.to_string(),
        (true, false) => elements.clone(),
        (false, false) => format!("{base}, {elements}"),
    };

    let explicit = if toggles.explicit {
        std::iter::once(EXPLICIT_MARKER)
            .chain(pool.explicit.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        String::new()
    };

    Enhancement {
        prompt,
        elements,
        explicit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedRandom;

    fn phrases(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn hoodie_scenario_appends_face_then_clothing() {
        let pool = ElementPool {
            face: phrases(&["scar"]),
            clothing: phrases(&["leather jacket"]),
            ..ElementPool::default()
        };
        let toggles = CategoryToggles {
            face: true,
            clothing: true,
            ..CategoryToggles::default()
        };
        let mut rng = ScriptedRandom::default();

        let out = enhance_prompt(&mut rng, "a modern hacker wearing a hoodie", &toggles, &pool);

        assert_eq!(out.prompt, "a modern hacker wearing a hoodie, scar, leather jacket");
        assert_eq!(out.elements, "scar, leather jacket");
        assert_eq!(out.explicit, "");
    }

    #[test]
    fn categories_follow_fixed_order_with_scripted_draws() {
        let pool = ElementPool {
            face: phrases(&["freckles", "scar"]),
            eyes: phrases(&["amber", "jade"]),
            poses: phrases(&["kneeling", "standing", "running"]),
            ..ElementPool::default()
        };
        let toggles = CategoryToggles {
            face: true,
            eyes: true,
            poses: true,
            ..CategoryToggles::default()
        };
        let mut rng = ScriptedRandom::with_indices(vec![1, 0, 2]);

        let out = enhance_prompt(&mut rng, "portrait", &toggles, &pool);

        assert_eq!(out.prompt, "portrait, scar, amber, running");
    }

    #[test]
    fn explicit_marker_comes_first() {
        let pool = ElementPool {
            hair: phrases(&["copper curls"]),
            explicit: phrases(&["a", "b"]),
            ..ElementPool::default()
        };
        let toggles = CategoryToggles {
            hair: true,
            explicit: true,
            ..CategoryToggles::default()
        };
        let mut rng = ScriptedRandom::default();

        let out = enhance_prompt(&mut rng, "", &toggles, &pool);

        assert_eq!(out.elements, "uncensored, copper curls");
        assert_eq!(out.prompt, "uncensored, copper curls");
        assert_eq!(out.explicit, "uncensored, a, b");
    }

    #[test]
    fn enabled_empty_category_contributes_nothing() {
        let toggles = CategoryToggles {
            background: true,
            ..CategoryToggles::default()
        };
        let mut rng = ScriptedRandom::default();

        let out = enhance_prompt(&mut rng, "base", &toggles, &ElementPool::default());

        assert_eq!(out.prompt, "base");
        assert_eq!(out.elements, "");
    }

    #[test]
    fn disabled_categories_are_skipped_even_with_phrases() {
        let pool = ElementPool {
            face: phrases(&["scar"]),
            ..ElementPool::default()
        };
        let mut rng = ScriptedRandom::default();

        let out = enhance_prompt(&mut rng, "base", &CategoryToggles::default(), &pool);

        assert_eq!(out.prompt, "base");
    }
}
