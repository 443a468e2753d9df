//! Maximal Marginal Relevance (MMR) for diversity-aware selection
//!
//! MMR = λ × sim(query, doc) - (1-λ) × max(sim(doc, selected))
//!
//! λ = 1.0: Pure relevance
//! λ = 0.5: Balanced relevance + diversity
//! λ = 0.0: Pure diversity

/// Cosine similarity; zero when either vector has no magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Candidate for MMR selection
#[derive(Debug, Clone, Copy)]
pub struct MmrCandidate<'a> {
    /// Caller's handle for the candidate
    pub id: usize,
    /// Similarity to the query
    pub relevance: f32,
    pub vector: &'a [f32],
}

/// Greedily select up to `k` candidates maximizing MMR.
///
/// `candidates` should be sorted by relevance, descending; ties on the MMR
/// score keep the earlier candidate. Returns candidate ids in selection order.
pub fn mmr_select(candidates: &[MmrCandidate<'_>], k: usize, lambda: f32) -> Vec<usize> {
    let k = k.min(candidates.len());
    let lambda = lambda.clamp(0.0, 1.0);

    let mut selected: Vec<usize> = Vec::with_capacity(k);
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();
    // Running max similarity of each candidate to the selected set
    let mut redundancy = vec![f32::NEG_INFINITY; candidates.len()];

    while selected.len() < k && !remaining.is_empty() {
        let mut best_pos = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (pos, &idx) in remaining.iter().enumerate() {
            let candidate = &candidates[idx];
            let max_sim = if selected.is_empty() { 0.0 } else { redundancy[idx] };
            let score = lambda * candidate.relevance - (1.0 - lambda) * max_sim;
            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }

        let chosen = remaining.remove(best_pos);
        selected.push(chosen);

        let chosen_vec = candidates[chosen].vector;
        for &idx in &remaining {
            let sim = cosine_similarity(candidates[idx].vector, chosen_vec);
            if sim > redundancy[idx] {
                redundancy[idx] = sim;
            }
        }
    }

    selected.into_iter().map(|i| candidates[i].id).collect()
}
