//! Round sampling
//!
//! Turns a draw request into a shuffled list of rounds. All functions take
//! the random source as a parameter; production code passes `rand::rng()`.

use rand::seq::{index, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::Catalog;
use crate::error::GameError;
use crate::types::*;

/// Wrong answers shown next to the correct one
const MAX_WRONG_ANSWERS: usize = MAX_ANSWERS - 1;

/// Questions requested from one group
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupSelection {
    /// Questions spread over the group's categories by the sampler
    #[serde(default)]
    pub random: usize,
    /// Explicit counts per category
    #[serde(default)]
    pub categories: BTreeMap<CategoryId, usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DrawRequest {
    #[serde(default)]
    pub groups: BTreeMap<GroupId, GroupSelection>,
    /// Categories requested without a group; rounds reference the group
    /// owning the category
    #[serde(default)]
    pub categories: BTreeMap<CategoryId, usize>,
}

/// Distribute `amount` extra questions over the group's categories.
///
/// Each pick lands on a category with probability proportional to the
/// questions it has left after what `counts` already allocates, so
/// exhausted categories are never picked. Stops early once the whole group
/// is exhausted.
pub fn shuffle_categories<R: Rng + ?Sized>(
    group: &CategoryGroup,
    amount: usize,
    counts: &mut BTreeMap<CategoryId, usize>,
    rng: &mut R,
) {
    for _ in 0..amount {
        let remaining: Vec<(&Category, usize)> = group
            .categories
            .iter()
            .map(|c| {
                let allocated = counts.get(&c.id).copied().unwrap_or(0);
                (c, c.pool.len().saturating_sub(allocated))
            })
            .filter(|(_, left)| *left > 0)
            .collect();

        let total: usize = remaining.iter().map(|(_, left)| left).sum();
        if total == 0 {
            tracing::debug!("Category group {} exhausted", group.id);
            return;
        }

        let mut pick = rng.random_range(0..total);
        for (category, left) in remaining {
            if pick < left {
                *counts.entry(category.id.clone()).or_insert(0) += 1;
                break;
            }
            pick -= left;
        }
    }
}

/// Up to `amount` rounds from `category` in random order. Asking for more
/// than the pool holds yields the whole pool.
pub fn draw_category<R: Rng + ?Sized>(
    group: &GroupRef,
    category: &Category,
    amount: usize,
    rng: &mut R,
) -> Vec<Round> {
    let amount = amount.min(category.pool.len());
    let category_ref = category.reference();

    index::sample(rng, category.pool.len(), amount)
        .into_iter()
        .filter_map(|i| category.pool.get(i))
        .map(|question| build_round(question, group.clone(), category_ref.clone(), rng))
        .collect()
}

/// One correct answer plus up to three wrong ones, in random order.
/// Position fields are filled in by [`draw`].
pub fn build_round<R: Rng + ?Sized>(
    question: &Question,
    group: GroupRef,
    category: CategoryRef,
    rng: &mut R,
) -> Round {
    let correct_pool = question.correct();
    let wrong_pool = question.wrong();

    let correct_answer = correct_pool[rng.random_range(0..correct_pool.len())].clone();

    let wrong_count = wrong_pool.len().min(MAX_WRONG_ANSWERS);
    let mut answers: Vec<DisplayableContent> = index::sample(rng, wrong_pool.len(), wrong_count)
        .into_iter()
        .map(|i| wrong_pool[i].clone())
        .collect();

    // wrong answers are already in random order, a random insert position
    // makes the whole list a uniform shuffle
    let correct_index = rng.random_range(0..=answers.len());
    answers.insert(correct_index, correct_answer);

    Round {
        question: question.question().clone(),
        answers,
        correct: correct_index + 1,
        current_round: 0,
        max_round: 0,
        group,
        category,
    }
}

/// Draw all rounds for a game
pub fn draw<R: Rng + ?Sized>(
    catalog: &Catalog,
    request: &DrawRequest,
    rng: &mut R,
) -> Result<Vec<Round>, GameError> {
    let mut rounds = Vec::new();

    for (group_id, selection) in &request.groups {
        let group = catalog.lookup_group(group_id)?;
        let group_ref = group.reference();

        let mut counts = selection.categories.clone();
        shuffle_categories(group, selection.random, &mut counts, rng);

        for (category_id, amount) in &counts {
            let category = catalog.lookup_category(category_id)?;
            rounds.extend(draw_category(&group_ref, category, *amount, rng));
        }
    }

    for (category_id, amount) in &request.categories {
        let category = catalog.lookup_category(category_id)?;
        let group_ref = catalog
            .group_of(category_id)
            .map(CategoryGroup::reference)
            .unwrap_or_default();
        rounds.extend(draw_category(&group_ref, category, *amount, rng));
    }

    if rounds.is_empty() {
        return Err(GameError::InsufficientQuestions);
    }

    rounds.shuffle(rng);
    let max_round = rounds.len();
    for (i, round) in rounds.iter_mut().enumerate() {
        round.current_round = i + 1;
        round.max_round = max_round;
    }

    Ok(rounds)
}
