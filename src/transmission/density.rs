use super::{ExposureBuffer, Spread};
use crate::group::MixingGroup;
use crate::log::debug;
use crate::population::HostView;
use crate::random::{probabilistic_round, shuffled_indices};
use rand::Rng;

/// Density-dependent transmission.
///
/// Every member faces the same chance `1 - (1 - contact_prob)^infectious` of exposure. That
/// many members (rounded at random) are taken from a shuffled enrollment list; each one still
/// present and susceptible meets a random infector. With `max_infectees` set, an infector is
/// dropped from the pool once it has that many successes.
pub(super) fn density_model<G, H, R>(
    group: &G,
    spread: &Spread<'_, H>,
    max_infectees: Option<usize>,
    rng: &mut R,
    buffer: &mut ExposureBuffer,
) where
    G: MixingGroup + ?Sized,
    H: HostView,
    R: Rng + ?Sized,
{
    let condition = spread.condition();
    let enrollees = group.enrollees();
    let mut infectors: Vec<_> = group.infectious_people(condition).to_vec();
    if infectors.is_empty() || enrollees.is_empty() {
        return;
    }

    let contact_prob = group
        .contact_rate(spread.day, condition, spread.disease.transmissibility())
        .clamp(0.0, 1.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let prob_infection = 1.0 - (1.0 - contact_prob).powi(infectors.len() as i32);
    #[allow(clippy::cast_precision_loss)]
    let exposed = probabilistic_round(rng, enrollees.len() as f64 * prob_infection);

    let mut infectee_counts = vec![0usize; infectors.len()];
    let mut capped = 0;
    for index in shuffled_indices(rng, enrollees.len()).into_iter().take(exposed) {
        if infectors.is_empty() {
            break;
        }
        let infectee = enrollees[index];
        if !spread.hosts.is_present(infectee, spread.group)
            || !spread.is_susceptible(infectee, buffer)
        {
            continue;
        }

        let position = rng.random_range(0..infectors.len());
        let infector = infectors[position];
        let prob = spread.hosts.infectivity(infector, condition);
        if !spread.attempt_transmission(prob, infector, infectee, rng, buffer) {
            continue;
        }
        infectee_counts[position] += 1;
        if max_infectees.is_some_and(|max| infectee_counts[position] >= max) {
            infectors.swap_remove(position);
            infectee_counts.swap_remove(position);
            capped += 1;
        }
    }

    if capped > 0 {
        debug!(
            "day {} density transmission in {:?}: {capped} infectors reached the cap of {:?}",
            spread.day, spread.group, max_infectees
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::group::GroupKind;
    use crate::hashing::HashMap;
    use crate::infection::Infection;
    use crate::transmission::test::{instant_disease, place, population_with};
    use crate::GroupId;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn run(size: usize, max_infectees: Option<usize>, seed: u64) -> ExposureBuffer {
        let disease = instant_disease();
        let (population, people) = population_with(&disease, size, &[0, 1]);
        let mut group = place(GroupKind::Neighborhood, &people, 1.0);
        group.update_infectious(disease.id(), &population);
        let spread = Spread {
            disease: &disease,
            hosts: &population,
            group: GroupId(0),
            day: 0,
            seasonal_multiplier: 1.0,
        };
        let mut buffer = ExposureBuffer::default();
        let mut rng = StdRng::seed_from_u64(seed);
        density_model(&group, &spread, max_infectees, &mut rng, &mut buffer);
        buffer
    }

    #[test]
    fn cap_limits_each_infector() {
        for seed in 0..5 {
            let buffer = run(102, Some(3), seed);
            assert_eq!(buffer.len(), 6);
            let mut per_infector: HashMap<_, usize> = HashMap::default();
            for infection in buffer.iter() {
                *per_infector.entry(infection.infector()).or_default() += 1;
            }
            assert!(per_infector.values().all(|&count| count == 3));
        }
    }

    #[test]
    fn without_cap_everyone_is_reached() {
        let buffer = run(40, None, 11);
        assert_eq!(buffer.len(), 38);
        assert!(buffer.iter().map(Infection::host).all(|p| p.0 >= 2));
    }

    #[test]
    fn zero_contact_means_no_exposure() {
        let disease = instant_disease();
        let (population, people) = population_with(&disease, 10, &[0]);
        let mut group = place(GroupKind::Neighborhood, &people, 0.0);
        group.update_infectious(disease.id(), &population);
        let spread = Spread {
            disease: &disease,
            hosts: &population,
            group: GroupId(0),
            day: 0,
            seasonal_multiplier: 1.0,
        };
        let mut buffer = ExposureBuffer::default();
        let mut rng = StdRng::seed_from_u64(2);
        density_model(&group, &spread, None, &mut rng, &mut buffer);
        assert_eq!(buffer.attempts(), 0);
    }
}
