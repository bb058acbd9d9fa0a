use super::{ExposureBuffer, Spread};
use crate::group::MixingGroup;
use crate::population::HostView;
use crate::random::{probabilistic_round, shuffled_indices};
use rand::Rng;
use std::collections::BTreeMap;

/// Capacity-based contact sampling.
///
/// Each infectious member, in random order, makes `contact_rate * infectivity` contacts
/// (rounded at random) among `max(capacity - 1, enrollees)` slots. Slots past the enrollment
/// list are contacts with people outside the group and are lost. A member drawn several times
/// gets one attempt per draw.
pub(super) fn default_model<G, H, R>(
    group: &G,
    spread: &Spread<'_, H>,
    rng: &mut R,
    buffer: &mut ExposureBuffer,
) where
    G: MixingGroup + ?Sized,
    H: HostView,
    R: Rng + ?Sized,
{
    let condition = spread.condition();
    let enrollees = group.enrollees();
    let number_targets = group.capacity().saturating_sub(1).max(enrollees.len());
    if number_targets == 0 {
        return;
    }
    let contact_rate = group.contact_rate(spread.day, condition, spread.disease.transmissibility());
    let infectious = group.infectious_people(condition);

    for index in shuffled_indices(rng, infectious.len()) {
        let infector = infectious[index];
        if !spread.hosts.is_infectious(infector, condition) {
            continue;
        }
        let contact_count =
            probabilistic_round(rng, contact_rate * spread.hosts.infectivity(infector, condition));

        // Target position to number of draws, visited in position order.
        let mut draws: BTreeMap<usize, usize> = BTreeMap::new();
        let mut contact = 0;
        while contact < contact_count {
            let position = rng.random_range(0..number_targets);
            if position < enrollees.len() {
                if enrollees[position] == infector {
                    if enrollees.len() > 1 {
                        continue;
                    }
                    break;
                }
                *draws.entry(position).or_default() += 1;
            }
            contact += 1;
        }

        for (position, times_drawn) in draws {
            let infectee = enrollees[position];
            if !spread.hosts.is_present(infectee, spread.group) {
                continue;
            }
            let prob = group.transmission_prob(condition, infector, infectee);
            for _ in 0..times_drawn {
                if spread.is_susceptible(infectee, buffer) {
                    spread.attempt_transmission(prob, infector, infectee, rng, buffer);
                }
            }
        }
    }
}
