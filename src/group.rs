//! Places and contact networks where transmission happens.

use crate::hashing::HashMap;
use crate::log::debug;
use crate::population::HostView;
use crate::{ConditionId, Context, DataPlugin, Day, GroupId, PersonId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    Household,
    Neighborhood,
    School,
    Classroom,
    Workplace,
    Office,
    Hospital,
    Network,
}

/// Day 0 of the simulation is a Monday.
pub fn is_weekend(day: Day) -> bool {
    day.rem_euclid(7) >= 5
}

/// Queries the transmission models make about a group.
pub trait MixingGroup {
    fn id(&self) -> GroupId;

    fn kind(&self) -> GroupKind;

    fn enrollees(&self) -> &[PersonId];

    /// Nominal size used by the default model.
    fn capacity(&self) -> usize;

    /// Members found infectious by the last [`MixingGroup::update_infectious`].
    fn infectious_people(&self, condition: ConditionId) -> &[PersonId];

    /// Expected contacts per infectious member per day, including the disease's
    /// transmissibility.
    fn contact_rate(&self, day: Day, condition: ConditionId, transmissibility: f64) -> f64;

    fn transmission_prob(&self, condition: ConditionId, infector: PersonId, infectee: PersonId)
    -> f64;

    fn is_open(&self, day: Day) -> bool;

    /// Records which present members are infectious with `condition` today.
    fn update_infectious(&mut self, condition: ConditionId, hosts: &dyn HostView);

    fn reset_place_state(&mut self, condition: ConditionId);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mixing {
    pub contacts_per_day: f64,
    pub transmission_prob: f64,
}

impl Default for Mixing {
    fn default() -> Self {
        Mixing {
            contacts_per_day: 1.0,
            transmission_prob: 1.0,
        }
    }
}

fn present_infectious(
    members: &[PersonId],
    group: GroupId,
    condition: ConditionId,
    hosts: &dyn HostView,
) -> Vec<PersonId> {
    members
        .iter()
        .copied()
        .filter(|&person| hosts.is_present(person, group) && hosts.is_infectious(person, condition))
        .collect()
}

#[derive(Debug, Clone)]
pub struct Place {
    id: GroupId,
    kind: GroupKind,
    enrollees: Vec<PersonId>,
    capacity: Option<usize>,
    mixing: Mixing,
    condition_mixing: HashMap<ConditionId, Mixing>,
    weekend_contact_multiplier: f64,
    // Half-open day intervals.
    closures: Vec<(Day, Day)>,
    infectious: HashMap<ConditionId, Vec<PersonId>>,
}

impl Place {
    pub fn new(id: GroupId, kind: GroupKind, enrollees: Vec<PersonId>, mixing: Mixing) -> Self {
        Place {
            id,
            kind,
            enrollees,
            capacity: None,
            mixing,
            condition_mixing: HashMap::default(),
            weekend_contact_multiplier: 1.0,
            closures: Vec::new(),
            infectious: HashMap::default(),
        }
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = Some(capacity);
    }

    pub fn enroll(&mut self, person: PersonId) {
        if !self.enrollees.contains(&person) {
            self.enrollees.push(person);
        }
    }

    pub fn unenroll(&mut self, person: PersonId) {
        self.enrollees.retain(|&p| p != person);
    }

    pub fn set_condition_mixing(&mut self, condition: ConditionId, mixing: Mixing) {
        self.condition_mixing.insert(condition, mixing);
    }

    pub fn set_weekend_contact_multiplier(&mut self, multiplier: f64) {
        self.weekend_contact_multiplier = multiplier;
    }

    /// Closes the place from `start` for `days` days.
    pub fn close(&mut self, start: Day, days: u32) {
        #[allow(clippy::cast_possible_wrap)]
        self.closures.push((start, start + days as Day));
    }

    fn mixing(&self, condition: ConditionId) -> &Mixing {
        self.condition_mixing.get(&condition).unwrap_or(&self.mixing)
    }
}

impl MixingGroup for Place {
    fn id(&self) -> GroupId {
        self.id
    }

    fn kind(&self) -> GroupKind {
        self.kind
    }

    fn enrollees(&self) -> &[PersonId] {
        &self.enrollees
    }

    /// The enrollment count unless set explicitly.
    fn capacity(&self) -> usize {
        self.capacity.unwrap_or(self.enrollees.len())
    }

    fn infectious_people(&self, condition: ConditionId) -> &[PersonId] {
        self.infectious
            .get(&condition)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn contact_rate(&self, day: Day, condition: ConditionId, transmissibility: f64) -> f64 {
        let contacts = self.mixing(condition).contacts_per_day * transmissibility;
        if self.kind == GroupKind::Neighborhood && is_weekend(day) {
            contacts * self.weekend_contact_multiplier
        } else {
            contacts
        }
    }

    fn transmission_prob(
        &self,
        condition: ConditionId,
        _infector: PersonId,
        _infectee: PersonId,
    ) -> f64 {
        self.mixing(condition).transmission_prob
    }

    fn is_open(&self, day: Day) -> bool {
        !self
            .closures
            .iter()
            .any(|&(start, end)| (start..end).contains(&day))
    }

    fn update_infectious(&mut self, condition: ConditionId, hosts: &dyn HostView) {
        let infectious = present_infectious(&self.enrollees, self.id, condition, hosts);
        self.infectious.insert(condition, infectious);
    }

    fn reset_place_state(&mut self, condition: ConditionId) {
        self.infectious.remove(&condition);
    }
}

/// An explicit contact graph. Links are undirected and stored once in each direction.
#[derive(Debug, Clone)]
pub struct Network {
    id: GroupId,
    members: Vec<PersonId>,
    positions: HashMap<PersonId, usize>,
    links: Vec<Vec<PersonId>>,
    contacts_per_link: f64,
    transmission_per_contact: f64,
    infectious: HashMap<ConditionId, Vec<PersonId>>,
}

impl Network {
    pub fn new(id: GroupId, contacts_per_link: f64, transmission_per_contact: f64) -> Self {
        Network {
            id,
            members: Vec::new(),
            positions: HashMap::default(),
            links: Vec::new(),
            contacts_per_link,
            transmission_per_contact,
            infectious: HashMap::default(),
        }
    }

    fn position(&mut self, person: PersonId) -> usize {
        if let Some(&position) = self.positions.get(&person) {
            return position;
        }
        let position = self.members.len();
        self.members.push(person);
        self.links.push(Vec::new());
        self.positions.insert(person, position);
        position
    }

    pub fn add_member(&mut self, person: PersonId) {
        self.position(person);
    }

    /// Links `a` and `b`, adding either as a member if needed. Self links and repeated
    /// links are ignored.
    pub fn add_link(&mut self, a: PersonId, b: PersonId) {
        if a == b {
            return;
        }
        let (pa, pb) = (self.position(a), self.position(b));
        if !self.links[pa].contains(&b) {
            self.links[pa].push(b);
            self.links[pb].push(a);
        }
    }

    pub fn out_degree(&self, person: PersonId) -> usize {
        self.positions
            .get(&person)
            .map_or(0, |&position| self.links[position].len())
    }

    /// The `index`th neighbor of `person`.
    pub fn end_of_link(&self, person: PersonId, index: usize) -> Option<PersonId> {
        let position = *self.positions.get(&person)?;
        self.links[position].get(index).copied()
    }

    pub fn contacts_per_link(&self) -> f64 {
        self.contacts_per_link
    }

    pub fn transmission_per_contact(&self) -> f64 {
        self.transmission_per_contact
    }
}

impl MixingGroup for Network {
    fn id(&self) -> GroupId {
        self.id
    }

    fn kind(&self) -> GroupKind {
        GroupKind::Network
    }

    fn enrollees(&self) -> &[PersonId] {
        &self.members
    }

    fn capacity(&self) -> usize {
        self.members.len()
    }

    fn infectious_people(&self, condition: ConditionId) -> &[PersonId] {
        self.infectious
            .get(&condition)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn contact_rate(&self, _day: Day, _condition: ConditionId, _transmissibility: f64) -> f64 {
        self.contacts_per_link
    }

    fn transmission_prob(
        &self,
        _condition: ConditionId,
        _infector: PersonId,
        _infectee: PersonId,
    ) -> f64 {
        self.transmission_per_contact
    }

    fn is_open(&self, _day: Day) -> bool {
        true
    }

    fn update_infectious(&mut self, condition: ConditionId, hosts: &dyn HostView) {
        let infectious = present_infectious(&self.members, self.id, condition, hosts);
        self.infectious.insert(condition, infectious);
    }

    fn reset_place_state(&mut self, condition: ConditionId) {
        self.infectious.remove(&condition);
    }
}

#[derive(Debug, Clone)]
pub enum Group {
    Place(Place),
    Network(Network),
}

impl Group {
    fn inner(&self) -> &dyn MixingGroup {
        match self {
            Group::Place(place) => place,
            Group::Network(network) => network,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn MixingGroup {
        match self {
            Group::Place(place) => place,
            Group::Network(network) => network,
        }
    }
}

impl MixingGroup for Group {
    fn id(&self) -> GroupId {
        self.inner().id()
    }

    fn kind(&self) -> GroupKind {
        self.inner().kind()
    }

    fn enrollees(&self) -> &[PersonId] {
        self.inner().enrollees()
    }

    fn capacity(&self) -> usize {
        self.inner().capacity()
    }

    fn infectious_people(&self, condition: ConditionId) -> &[PersonId] {
        self.inner().infectious_people(condition)
    }

    fn contact_rate(&self, day: Day, condition: ConditionId, transmissibility: f64) -> f64 {
        self.inner().contact_rate(day, condition, transmissibility)
    }

    fn transmission_prob(
        &self,
        condition: ConditionId,
        infector: PersonId,
        infectee: PersonId,
    ) -> f64 {
        self.inner().transmission_prob(condition, infector, infectee)
    }

    fn is_open(&self, day: Day) -> bool {
        self.inner().is_open(day)
    }

    fn update_infectious(&mut self, condition: ConditionId, hosts: &dyn HostView) {
        self.inner_mut().update_infectious(condition, hosts);
    }

    fn reset_place_state(&mut self, condition: ConditionId) {
        self.inner_mut().reset_place_state(condition);
    }
}

/// All groups of the simulation, indexed by [`GroupId`].
#[derive(Default)]
pub struct GroupRegistry {
    pub(crate) groups: Vec<Group>,
}

impl DataPlugin for GroupRegistry {
    const new: &'static dyn Fn() -> Self = &GroupRegistry::default;
}

pub trait ContextGroupsExt {
    fn add_place(&mut self, kind: GroupKind, enrollees: Vec<PersonId>, mixing: Mixing) -> GroupId;

    fn add_network(&mut self, contacts_per_link: f64, transmission_per_contact: f64) -> GroupId;

    fn get_group(&self, id: GroupId) -> Option<&Group>;

    fn get_place_mut(&mut self, id: GroupId) -> Option<&mut Place>;

    fn get_network_mut(&mut self, id: GroupId) -> Option<&mut Network>;

    fn group_count(&self) -> usize;
}

impl ContextGroupsExt for Context {
    fn add_place(&mut self, kind: GroupKind, enrollees: Vec<PersonId>, mixing: Mixing) -> GroupId {
        let registry = self.get_data_container_mut::<GroupRegistry>();
        let id = GroupId(registry.groups.len());
        debug!("adding {kind:?} {id:?} with {} enrollees", enrollees.len());
        registry
            .groups
            .push(Group::Place(Place::new(id, kind, enrollees, mixing)));
        id
    }

    fn add_network(&mut self, contacts_per_link: f64, transmission_per_contact: f64) -> GroupId {
        let registry = self.get_data_container_mut::<GroupRegistry>();
        let id = GroupId(registry.groups.len());
        registry.groups.push(Group::Network(Network::new(
            id,
            contacts_per_link,
            transmission_per_contact,
        )));
        id
    }

    fn get_group(&self, id: GroupId) -> Option<&Group> {
        self.get_data_container::<GroupRegistry>()
            .and_then(|registry| registry.groups.get(id.0))
    }

    fn get_place_mut(&mut self, id: GroupId) -> Option<&mut Place> {
        match self.get_data_container_mut::<GroupRegistry>().groups.get_mut(id.0) {
            Some(Group::Place(place)) => Some(place),
            _ => None,
        }
    }

    fn get_network_mut(&mut self, id: GroupId) -> Option<&mut Network> {
        match self.get_data_container_mut::<GroupRegistry>().groups.get_mut(id.0) {
            Some(Group::Network(network)) => Some(network),
            _ => None,
        }
    }

    fn group_count(&self) -> usize {
        self.get_data_container::<GroupRegistry>()
            .map_or(0, |registry| registry.groups.len())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::population::Population;

    const FLU: ConditionId = ConditionId(0);

    #[test]
    fn weekends_follow_a_monday_start() {
        let weekend: Vec<Day> = (0..14).filter(|&day| is_weekend(day)).collect();
        assert_eq!(weekend, vec![5, 6, 12, 13]);
        assert!(is_weekend(-1));
    }

    #[test]
    fn neighborhood_contacts_rise_on_weekends() {
        let mut context = Context::new();
        let mixing = Mixing {
            contacts_per_day: 4.0,
            transmission_prob: 0.5,
        };
        let id = context.add_place(GroupKind::Neighborhood, vec![], mixing);
        context
            .get_place_mut(id)
            .unwrap()
            .set_weekend_contact_multiplier(1.5);
        let place = context.get_group(id).unwrap();
        assert_eq!(place.contact_rate(0, FLU, 0.5), 2.0);
        assert_eq!(place.contact_rate(5, FLU, 0.5), 3.0);
        assert_eq!(place.transmission_prob(FLU, PersonId(0), PersonId(1)), 0.5);

        let school = context.add_place(GroupKind::School, vec![], mixing);
        assert_eq!(context.get_group(school).unwrap().contact_rate(5, FLU, 0.5), 2.0);
    }

    #[test]
    fn per_condition_mixing_overrides_default() {
        let mut place = Place::new(GroupId(0), GroupKind::Workplace, vec![], Mixing::default());
        place.set_condition_mixing(
            ConditionId(1),
            Mixing {
                contacts_per_day: 8.0,
                transmission_prob: 0.1,
            },
        );
        assert_eq!(place.contact_rate(0, FLU, 1.0), 1.0);
        assert_eq!(place.contact_rate(0, ConditionId(1), 1.0), 8.0);
    }

    #[test]
    fn closures_cover_half_open_intervals() {
        let mut place = Place::new(GroupId(0), GroupKind::School, vec![], Mixing::default());
        place.close(10, 3);
        assert!(place.is_open(9));
        assert!(!place.is_open(10));
        assert!(!place.is_open(12));
        assert!(place.is_open(13));
    }

    #[test]
    fn infectious_cache_needs_presence() {
        let mut population = Population::default();
        let people: Vec<PersonId> = (0..3).map(|_| population.add_person(20.0)).collect();
        let mut place =
            Place::new(GroupId(0), GroupKind::Office, people.clone(), Mixing::default());
        place.update_infectious(FLU, &population);
        assert!(place.infectious_people(FLU).is_empty());
        place.reset_place_state(FLU);
        assert_eq!(place.capacity(), 3);
        place.set_capacity(10);
        assert_eq!(place.capacity(), 10);
        place.unenroll(people[0]);
        place.enroll(people[1]);
        assert_eq!(place.enrollees(), &people[1..]);
    }

    #[test]
    fn network_links_are_symmetric() {
        let mut network = Network::new(GroupId(2), 0.5, 0.2);
        network.add_link(PersonId(1), PersonId(2));
        network.add_link(PersonId(1), PersonId(3));
        network.add_link(PersonId(2), PersonId(1));
        network.add_link(PersonId(3), PersonId(3));
        assert_eq!(network.out_degree(PersonId(1)), 2);
        assert_eq!(network.out_degree(PersonId(2)), 1);
        assert_eq!(network.out_degree(PersonId(9)), 0);
        assert_eq!(network.end_of_link(PersonId(1), 1), Some(PersonId(3)));
        assert_eq!(network.end_of_link(PersonId(3), 0), Some(PersonId(1)));
        assert_eq!(network.enrollees(), &[PersonId(1), PersonId(2), PersonId(3)]);
        assert_eq!(network.kind(), GroupKind::Network);
    }

    #[test]
    fn registry_hands_out_ids_in_order() {
        let mut context = Context::new();
        let home = context.add_place(GroupKind::Household, vec![PersonId(0)], Mixing::default());
        let net = context.add_network(1.0, 0.1);
        assert_eq!((home, net), (GroupId(0), GroupId(1)));
        assert!(context.get_network_mut(home).is_none());
        assert!(context.get_place_mut(net).is_none());
        assert_eq!(context.group_count(), 2);
        assert_eq!(context.get_group(net).unwrap().id(), net);
    }
}
