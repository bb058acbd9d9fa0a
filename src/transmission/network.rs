use super::{ExposureBuffer, Spread};
use crate::group::{MixingGroup, Network};
use crate::population::HostView;
use rand::Rng;

/// Degree-weighted transmission over the links of infectious network members.
///
/// `round(links * contacts_per_link * transmission_per_contact)` links are drawn with
/// replacement; the far end of each drawn link is exposed with the infector's infectivity.
pub(super) fn network_model<H, R>(
    network: &Network,
    spread: &Spread<'_, H>,
    rng: &mut R,
    buffer: &mut ExposureBuffer,
) where
    H: HostView,
    R: Rng + ?Sized,
{
    let condition = spread.condition();
    let infectious = network.infectious_people(condition);

    // link_sum[i] is the number of links owned by infectors 0..=i.
    let link_sum: Vec<usize> = infectious
        .iter()
        .scan(0, |total, &infector| {
            *total += network.out_degree(infector);
            Some(*total)
        })
        .collect();
    let total_links = link_sum.last().copied().unwrap_or(0);
    if total_links == 0 {
        return;
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let max_transmissions = (total_links as f64
        * network.contacts_per_link()
        * network.transmission_per_contact())
    .round()
    .max(0.0) as usize;

    for _ in 0..max_transmissions {
        let selected = rng.random_range(0..total_links);
        let owner = link_sum.partition_point(|&sum| sum <= selected);
        let infector = infectious[owner];
        let first_link = if owner == 0 { 0 } else { link_sum[owner - 1] };
        let Some(infectee) = network.end_of_link(infector, selected - first_link) else {
            continue;
        };
        if spread.is_susceptible(infectee, buffer) {
            let prob = spread.hosts.infectivity(infector, condition);
            spread.attempt_transmission(prob, infector, infectee, rng, buffer);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transmission::test::{infectees, instant_disease, population_with};
    use crate::GroupId;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn only_neighbors_of_infectors_are_reached() {
        let disease = instant_disease();
        let (population, people) = population_with(&disease, 8, &[0]);
        let mut network = Network::new(GroupId(0), 1.0, 1.0);
        for &leaf in &people[1..5] {
            network.add_link(people[0], leaf);
        }
        // Not linked to the infector.
        network.add_link(people[5], people[6]);
        network.add_member(people[7]);
        network.update_infectious(disease.id(), &population);

        let spread = Spread {
            disease: &disease,
            hosts: &population,
            group: GroupId(0),
            day: 0,
            seasonal_multiplier: 1.0,
        };
        for seed in 0..10 {
            let mut buffer = ExposureBuffer::default();
            let mut rng = StdRng::seed_from_u64(seed);
            network_model(&network, &spread, &mut rng, &mut buffer);
            assert!(!buffer.is_empty());
            assert!(buffer.attempts() <= 4);
            for person in infectees(&buffer) {
                assert!(people[1..5].contains(&person));
            }
        }
    }

    #[test]
    fn isolated_infectors_do_nothing() {
        let disease = instant_disease();
        let (population, people) = population_with(&disease, 3, &[0]);
        let mut network = Network::new(GroupId(0), 5.0, 1.0);
        network.add_member(people[0]);
        network.add_link(people[1], people[2]);
        network.update_infectious(disease.id(), &population);

        let spread = Spread {
            disease: &disease,
            hosts: &population,
            group: GroupId(0),
            day: 0,
            seasonal_multiplier: 1.0,
        };
        let mut buffer = ExposureBuffer::default();
        let mut rng = StdRng::seed_from_u64(0);
        network_model(&network, &spread, &mut rng, &mut buffer);
        assert_eq!(buffer.attempts(), 0);
    }
}
