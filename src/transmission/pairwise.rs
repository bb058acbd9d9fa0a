use super::{ExposureBuffer, Spread};
use crate::group::MixingGroup;
use crate::population::HostView;
use rand::Rng;

/// Every infectious member gets one attempt on every other present member. Quadratic in the
/// group size, so it is only used for households.
pub(super) fn pairwise_model<G, H, R>(
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
    let contact_prob = group.contact_rate(spread.day, condition, spread.disease.transmissibility());

    for &infector in group.infectious_people(condition) {
        let infectivity = spread.hosts.infectivity(infector, condition);
        for &infectee in group.enrollees() {
            if infectee == infector
                || !spread.hosts.is_present(infectee, spread.group)
                || !spread.is_susceptible(infectee, buffer)
            {
                continue;
            }
            let prob = group.transmission_prob(condition, infector, infectee)
                * infectivity
                * contact_prob;
            spread.attempt_transmission(prob, infector, infectee, rng, buffer);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::group::GroupKind;
    use crate::transmission::test::{infectees, instant_disease, place, population_with};
    use crate::GroupId;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn every_pair_gets_one_attempt() {
        let disease = instant_disease();
        let (population, people) = population_with(&disease, 5, &[1, 3]);
        let mut group = place(GroupKind::Household, &people, 0.5);
        group.update_infectious(disease.id(), &population);
        let spread = Spread {
            disease: &disease,
            hosts: &population,
            group: GroupId(0),
            day: 0,
            seasonal_multiplier: 1.0,
        };
        let mut buffer = ExposureBuffer::default();
        let mut rng = StdRng::seed_from_u64(9);
        pairwise_model(&group, &spread, &mut rng, &mut buffer);

        // Two infectors and three susceptibles. The second infector skips whoever the first
        // one already infected.
        assert!((3..=6).contains(&buffer.attempts()));
        assert!(buffer.len() <= 3);
        for person in infectees(&buffer) {
            assert!(![people[1], people[3]].contains(&person));
        }
    }

    #[test]
    fn certain_contact_infects_the_household() {
        let disease = instant_disease();
        let (mut population, people) = population_with(&disease, 4, &[0]);
        population.set_absent(people[3], GroupId(0), true);
        let mut group = place(GroupKind::Household, &people, 1.0);
        group.update_infectious(disease.id(), &population);
        let spread = Spread {
            disease: &disease,
            hosts: &population,
            group: GroupId(0),
            day: 0,
            seasonal_multiplier: 1.0,
        };
        let mut buffer = ExposureBuffer::default();
        let mut rng = StdRng::seed_from_u64(9);
        pairwise_model(&group, &spread, &mut rng, &mut buffer);
        assert_eq!(infectees(&buffer), vec![people[1], people[2]]);
        assert_eq!(buffer.attempts(), 2);
    }
}
