//! Feed composition: mixes social, educational and game content for a learner.
//!
//! Pure over already-fetched items. Ordering is randomised per call, so
//! callers should only rely on membership and the social share.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::config::{DEFAULT_BLOCKED_WORDS, DEFAULT_SAFE_WORDS, DEFAULT_SOCIAL_RATIO};
use crate::models::{
    content::ContentItem,
    learner::{Framework, Learner},
};
use crate::utils::safety::SafetyFilter;

/// Tunables for the composer, loaded from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedOptions {
    /// Upper share of social posts, in (0, 1].
    pub social_ratio: f64,
    pub safe_words: Vec<String>,
    pub blocked_words: Vec<String>,
    /// Join the static grade-4 lesson table for learners aged 9-10.
    pub static_lessons: bool,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            social_ratio: DEFAULT_SOCIAL_RATIO,
            safe_words: DEFAULT_SAFE_WORDS.iter().map(|w| w.to_string()).collect(),
            blocked_words: DEFAULT_BLOCKED_WORDS.iter().map(|w| w.to_string()).collect(),
            static_lessons: true,
        }
    }
}

/// Entry of the built-in lesson table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticLesson {
    pub title: &'static str,
    pub content: &'static str,
    pub framework: Framework,
}

pub const GRADE_4_LESSONS: &[StaticLesson] = &[StaticLesson {
    title: "Math: Fractions",
    content: "Learn about adding fractions...",
    framework: Framework::CommonCore,
}];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposedFeed {
    pub items: Vec<ContentItem>,
    pub lessons: Vec<StaticLesson>,
}

/// Builds the display sequence for one learner.
///
/// Social posts must contain a safe word, educational items must not exceed
/// the learner's grade, games always pass. The social partition is capped at
/// `ceil(social_ratio * total)` where total counts the filtered partitions.
pub fn compose<R>(
    learner: &Learner,
    items: Vec<ContentItem>,
    options: &FeedOptions,
    rng: &mut R,
) -> ComposedFeed
where
    R: Rng + ?Sized,
{
    let filter = SafetyFilter::new(&options.safe_words, &options.blocked_words);

    let mut social = Vec::new();
    let mut educational = Vec::new();
    let mut games = Vec::new();

    for item in items {
        match item {
            ContentItem::Social {
                id,
                age_group,
                author,
                body,
            } => {
                // Bodies are plain text; escaping is left to the renderer.
                if filter.is_safe(&body) {
                    social.push(ContentItem::Social {
                        id,
                        age_group,
                        author,
                        body: filter.mask(&body),
                    });
                }
            }
            ContentItem::Educational { grade, .. } if grade > learner.grade => {}
            item @ ContentItem::Educational { .. } => educational.push(item),
            item @ ContentItem::Game { .. } => games.push(item),
        }
    }

    let total = social.len() + educational.len() + games.len();
    let social_target = social_target(total, options.social_ratio);

    social.shuffle(rng);
    educational.shuffle(rng);
    games.shuffle(rng);
    social.truncate(social_target);

    let mut sequence = Vec::with_capacity(social.len() + educational.len() + games.len());
    sequence.extend(social);
    sequence.extend(educational);
    sequence.extend(games);

    ComposedFeed {
        items: sequence,
        lessons: if options.static_lessons {
            static_lessons_for(learner)
        } else {
            Vec::new()
        },
    }
}

pub fn social_target(total: usize, ratio: f64) -> usize {
    (ratio * total as f64).ceil() as usize
}

/// Grade-4 lessons for the learner's framework, offered at ages 9 and 10.
pub fn static_lessons_for(learner: &Learner) -> Vec<StaticLesson> {
    if !(9..=10).contains(&learner.age) {
        return Vec::new();
    }
    GRADE_4_LESSONS
        .iter()
        .filter(|l| l.framework == learner.framework)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        content::{AnswerFormat, ExpectedAnswer},
        learner::{Schedule, Theme},
    };
    use rand::{SeedableRng, rngs::StdRng};
    use std::collections::BTreeMap;

    fn learner(age: i32, grade: i32) -> Learner {
        Learner {
            id: "user_1".to_string(),
            name: "Ada".to_string(),
            age,
            grade,
            framework: Framework::CommonCore,
            theme: Theme::Light,
            parent_email: None,
            offline_mode: false,
            schedule: Schedule::default(),
        }
    }

    fn social(id: i64, body: &str) -> ContentItem {
        ContentItem::Social {
            id,
            age_group: "9-12".to_string(),
            author: Some("user_2".to_string()),
            body: body.to_string(),
        }
    }

    fn lesson(id: i64, grade: i32) -> ContentItem {
        ContentItem::Educational {
            id,
            age_group: "9-12".to_string(),
            subject: "Math".to_string(),
            standard: "CCSS".to_string(),
            grade,
            question: "2 + 3 = ?".to_string(),
            format: AnswerFormat::MultipleChoice,
            options: vec!["5".to_string(), "6".to_string()],
            answer: ExpectedAnswer::Exact("5".to_string()),
        }
    }

    fn game(id: i64) -> ContentItem {
        ContentItem::Game {
            id,
            age_group: "6-8".to_string(),
            name: "Farm Math".to_string(),
            link: "https://example.com/farm".to_string(),
        }
    }

    fn mixed_items() -> Vec<ContentItem> {
        let mut items = Vec::new();
        for i in 0..10 {
            items.push(social(i, "Let's learn about space"));
        }
        items.push(social(10, "nothing good here"));
        items.push(social(11, "I hate homework but math is fun"));
        for i in 20..24 {
            items.push(lesson(i, (i - 20) as i32 * 2));
        }
        items.push(game(30));
        items.push(game(31));
        items
    }

    fn kinds(feed: &ComposedFeed) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for item in &feed.items {
            *counts.entry(item.kind()).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn test_unsafe_social_posts_are_dropped() {
        let mut rng = StdRng::seed_from_u64(1);
        let feed = compose(&learner(10, 4), mixed_items(), &FeedOptions::default(), &mut rng);

        assert!(feed.items.iter().all(|i| i.id() != 10));
        let filter = SafetyFilter::new(&FeedOptions::default().safe_words, &[]);
        for item in &feed.items {
            if let ContentItem::Social { body, .. } = item {
                assert!(filter.is_safe(body));
            }
        }
    }

    #[test]
    fn test_blocked_words_are_masked() {
        let mut rng = StdRng::seed_from_u64(2);
        let feed = compose(
            &learner(10, 4),
            vec![social(11, "I hate homework but math is fun")],
            &FeedOptions::default(),
            &mut rng,
        );
        assert_eq!(
            feed.items,
            vec![social(11, "I *** homework but math is fun")]
        );
    }

    #[test]
    fn test_social_body_text_is_not_escaped() {
        let mut rng = StdRng::seed_from_u64(3);
        let body = "Tom & Jerry learn that 3 < 5";
        let feed = compose(
            &learner(10, 4),
            vec![social(12, body)],
            &FeedOptions::default(),
            &mut rng,
        );
        assert_eq!(feed.items, vec![social(12, body)]);
    }

    #[test]
    fn test_educational_items_above_grade_are_dropped() {
        let mut rng = StdRng::seed_from_u64(3);
        let feed = compose(&learner(10, 3), mixed_items(), &FeedOptions::default(), &mut rng);
        for item in &feed.items {
            if let ContentItem::Educational { grade, .. } = item {
                assert!(*grade <= 3);
            }
        }
        // grades 0 and 2 pass, 4 and 6 do not
        assert_eq!(kinds(&feed).get("educational"), Some(&2));
    }

    #[test]
    fn test_social_share_is_capped() {
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let feed = compose(&learner(10, 4), mixed_items(), &FeedOptions::default(), &mut rng);
            let counts = kinds(&feed);
            // 11 safe social + 3 educational + 2 games = 16 eligible
            let cap = social_target(16, 0.6);
            assert_eq!(cap, 10);
            assert!(counts.get("social").copied().unwrap_or(0) <= cap);
            assert_eq!(counts.get("educational"), Some(&3));
            assert_eq!(counts.get("game"), Some(&2));
        }
    }

    #[test]
    fn test_partitions_keep_their_order() {
        let mut rng = StdRng::seed_from_u64(4);
        let feed = compose(&learner(10, 12), mixed_items(), &FeedOptions::default(), &mut rng);
        let order: Vec<&str> = feed.items.iter().map(|i| i.kind()).collect();
        let first_edu = order.iter().position(|k| *k == "educational").unwrap();
        let first_game = order.iter().position(|k| *k == "game").unwrap();
        assert!(order[..first_edu].iter().all(|k| *k == "social"));
        assert!(order[first_edu..first_game].iter().all(|k| *k == "educational"));
        assert!(order[first_game..].iter().all(|k| *k == "game"));
    }

    #[test]
    fn test_same_input_yields_same_multiset() {
        let options = FeedOptions::default();
        // only social posts: cap equals the whole partition, so nothing is cut
        let items: Vec<ContentItem> = (0..5).map(|i| social(i, "fun story")).collect();
        let mut a: Vec<i64> = compose(&learner(10, 4), items.clone(), &options, &mut rand::thread_rng())
            .items
            .iter()
            .map(|i| i.id())
            .collect();
        let mut b: Vec<i64> = compose(&learner(10, 4), items, &options, &mut rand::thread_rng())
            .items
            .iter()
            .map(|i| i.id())
            .collect();
        a.sort();
        b.sort();
        assert_eq!(a, b);
        assert_eq!(a, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_non_social_multiset_is_stable() {
        let options = FeedOptions::default();
        let collect = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut ids: Vec<i64> = compose(&learner(10, 12), mixed_items(), &options, &mut rng)
                .items
                .iter()
                .filter(|i| i.kind() != "social")
                .map(|i| i.id())
                .collect();
            ids.sort();
            ids
        };
        assert_eq!(collect(5), collect(6));
    }

    #[test]
    fn test_empty_input() {
        let mut rng = StdRng::seed_from_u64(7);
        let feed = compose(&learner(12, 6), Vec::new(), &FeedOptions::default(), &mut rng);
        assert!(feed.items.is_empty());
        assert!(feed.lessons.is_empty());
    }

    #[test]
    fn test_static_lessons_for_age_and_framework() {
        assert_eq!(static_lessons_for(&learner(9, 4)).len(), 1);
        assert_eq!(static_lessons_for(&learner(10, 4)).len(), 1);
        assert!(static_lessons_for(&learner(11, 4)).is_empty());
        assert!(static_lessons_for(&learner(8, 3)).is_empty());

        let mut ib = learner(10, 4);
        ib.framework = Framework::Ib;
        assert!(static_lessons_for(&ib).is_empty());
    }

    #[test]
    fn test_static_lessons_can_be_disabled() {
        let options = FeedOptions {
            static_lessons: false,
            ..FeedOptions::default()
        };
        let mut rng = StdRng::seed_from_u64(8);
        let feed = compose(&learner(10, 4), mixed_items(), &options, &mut rng);
        assert!(feed.lessons.is_empty());
    }

    #[test]
    fn test_social_target_rounds_up() {
        assert_eq!(social_target(0, 0.6), 0);
        assert_eq!(social_target(1, 0.6), 1);
        assert_eq!(social_target(5, 0.6), 3);
        assert_eq!(social_target(7, 0.6), 5);
    }
}
