use super::{to_waypoints, Profile};
use crate::error::SessionError;
use crate::system::config::Configuration;
use crate::telemetry::format_clock;
use crate::types::{ProfileKind, Waypoint, DEVICE_POWER_KW, NEW_POINT_STEP_S, SECONDS_PER_HOUR};
use log::{debug, info};
use std::fmt;

/// Derived facts about the selected profile.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedProfileInfo {
    pub name: String,
    pub kind: ProfileKind,
    pub duration_s: f64,
    /// Total duration as `HH:MM:SS`.
    pub eta: String,
    pub energy_kwh: f64,
    pub cost: f64,
    pub currency: String,
}

impl SelectedProfileInfo {
    fn new(profile: &Profile, config: &Configuration) -> Self {
        let duration_s = profile.duration_s();
        let energy_kwh = DEVICE_POWER_KW * duration_s / SECONDS_PER_HOUR;
        Self {
            name: profile.name.clone(),
            kind: profile.kind(),
            duration_s,
            eta: format_clock(duration_s),
            energy_kwh,
            cost: energy_kwh * config.kwh_rate,
            currency: config.currency_type.clone(),
        }
    }
}

impl fmt::Display for SelectedProfileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) {:.2} kWh ({}: {:.2})",
            self.name, self.eta, self.energy_kwh, self.currency, self.cost
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindFilter {
    All,
    Only(ProfileKind),
}

/// Editable copy of a profile's waypoints. Never aliases the committed set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkingCopy {
    pub name: String,
    pub points: Vec<Waypoint>,
}

/// The committed profile set as last reported by storage, the selection, and
/// the edit working copy.
#[derive(Debug, Default)]
pub struct ProfileModel {
    profiles: Vec<Profile>,
    selected: Option<String>,
    // Name to select at the next refresh if the storage reports it
    deferred: Option<String>,
    working: Option<WorkingCopy>,
}

impl ProfileModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn names(&self) -> Vec<String> {
        self.profiles.iter().map(|p| p.name.clone()).collect()
    }

    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// `(index, name)` of every profile matching the filter, in server order.
    pub fn list_by_kind(&self, filter: KindFilter) -> Vec<(usize, String)> {
        self.profiles
            .iter()
            .enumerate()
            .filter(|(_, p)| match filter {
                KindFilter::All => true,
                KindFilter::Only(kind) => p.kind() == kind,
            })
            .map(|(i, p)| (i, p.name.clone()))
            .collect()
    }

    pub fn selected_name(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_profile(&self) -> Option<&Profile> {
        self.selected.as_deref().and_then(|name| self.profile(name))
    }

    pub fn select_profile(
        &mut self,
        name: &str,
        config: &Configuration,
    ) -> Result<SelectedProfileInfo, SessionError> {
        let profile = self
            .profile(name)
            .ok_or_else(|| SessionError::NotFound(name.to_string()))?;
        let info = SelectedProfileInfo::new(profile, config);
        self.selected = Some(name.to_string());
        debug!("Selected profile: {}", info);
        Ok(info)
    }

    /// Select `name` at the next `replace_profile_set`, if the storage reports it.
    /// The current selection is left alone until then.
    pub fn defer_selection(&mut self, name: &str) {
        self.deferred = Some(name.to_string());
    }

    /// Selection hint from the controller. Applied at once when the name is
    /// loaded, deferred while nothing is loaded yet, otherwise ignored.
    pub fn apply_selection_hint(&mut self, name: &str) -> bool {
        if self.profile(name).is_some() {
            self.selected = Some(name.to_string());
            true
        } else if self.profiles.is_empty() {
            self.defer_selection(name);
            true
        } else {
            debug!("Ignoring selection hint '{}': not a loaded profile", name);
            false
        }
    }

    pub fn select_first(&mut self) {
        self.selected = self.profiles.first().map(|p| p.name.clone());
    }

    pub fn summary(&self, config: &Configuration) -> Option<SelectedProfileInfo> {
        self.selected_profile()
            .map(|profile| SelectedProfileInfo::new(profile, config))
    }

    /// Wholesale replacement after a storage refresh. A deferred name wins when
    /// present; the selection survives by name, else falls back to the first
    /// profile, else is cleared.
    pub fn replace_profile_set(&mut self, profiles: Vec<Profile>) {
        self.profiles = profiles;

        if let Some(name) = self.deferred.take() {
            if self.profile(&name).is_some() {
                self.selected = Some(name);
            }
        }

        let keep = self
            .selected
            .as_deref()
            .map(|name| self.profile(name).is_some())
            .unwrap_or(false);
        if !keep {
            self.select_first();
        }

        info!(
            "Profile set replaced: {} profiles, selected {:?}",
            self.profiles.len(),
            self.selected
        );
    }

    pub fn is_editing(&self) -> bool {
        self.working.is_some()
    }

    pub fn working_copy(&self) -> Option<&WorkingCopy> {
        self.working.as_ref()
    }

    pub fn begin_new_profile(&mut self) {
        self.working = Some(WorkingCopy::default());
    }

    pub fn begin_edit_profile(&mut self, name: &str) -> Result<(), SessionError> {
        let profile = self
            .profile(name)
            .ok_or_else(|| SessionError::NotFound(name.to_string()))?;
        self.working = Some(WorkingCopy {
            name: profile.name.clone(),
            points: to_waypoints(profile),
        });
        Ok(())
    }

    pub fn discard_edit(&mut self) {
        self.working = None;
    }

    fn working_points(&mut self) -> Result<&mut Vec<Waypoint>, SessionError> {
        self.working
            .as_mut()
            .map(|w| &mut w.points)
            .ok_or_else(|| SessionError::InvalidProfile("no profile is being edited".to_string()))
    }

    /// Replace the point at `index`, or append when `index` is one past the end.
    pub fn upsert_point(&mut self, index: usize, point: Waypoint) -> Result<(), SessionError> {
        if !point.time_s.is_finite() || point.time_s < 0.0 || !point.temperature.is_finite() {
            return Err(SessionError::InvalidProfile(format!(
                "point ({}, {}) is not a valid time/temperature pair",
                point.time_s, point.temperature
            )));
        }

        let points = self.working_points()?;
        match index {
            i if i < points.len() => points[i] = point,
            i if i == points.len() => points.push(point),
            i => {
                return Err(SessionError::InvalidProfile(format!(
                    "point {} is out of range ({} points)",
                    i + 1,
                    points.len()
                )))
            }
        }
        Ok(())
    }

    /// Append a point a fixed step after the last one (or at zero).
    pub fn append_point(&mut self, temperature: f64) -> Result<Waypoint, SessionError> {
        let points = self.working_points()?;
        let time_s = points
            .last()
            .map(|p| p.time_s.trunc() + NEW_POINT_STEP_S)
            .unwrap_or(0.0);
        let point = Waypoint::new(time_s, temperature);
        let index = points.len();
        self.upsert_point(index, point)?;
        Ok(point)
    }

    pub fn remove_last_point(&mut self) -> Result<Option<Waypoint>, SessionError> {
        Ok(self.working_points()?.pop())
    }

    /// Validate and finalize an edit into a waypoint profile ready for storage.
    pub fn commit_edit(name: &str, points: &[Waypoint]) -> Result<Profile, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::InvalidProfile(
                "a profile needs a name".to_string(),
            ));
        }

        let mut last = -1.0;
        for (index, point) in points.iter().enumerate() {
            if !point.time_s.is_finite() || !point.temperature.is_finite() {
                return Err(SessionError::InvalidProfile(format!(
                    "point {} ({}, {}) is not a valid time/temperature pair",
                    index + 1,
                    point.time_s,
                    point.temperature
                )));
            }
            if point.time_s <= last {
                return Err(SessionError::time_machine(index, point.time_s, last));
            }
            last = point.time_s;
        }

        Ok(Profile::waypoints(name, points.to_vec()))
    }

    /// Commit the working copy under `name`. The committed set is untouched; the
    /// result goes to storage.
    pub fn commit_working(&self, name: &str) -> Result<Profile, SessionError> {
        let working = self
            .working
            .as_ref()
            .ok_or_else(|| SessionError::InvalidProfile("no profile is being edited".to_string()))?;
        Self::commit_edit(name, &working.points)
    }

    /// Waypoints currently on display: the working copy while editing, otherwise
    /// the selected profile in waypoint form.
    pub fn displayed_waypoints(&self) -> Vec<Waypoint> {
        match (&self.working, self.selected_profile()) {
            (Some(working), _) => working.points.clone(),
            (None, Some(profile)) => to_waypoints(profile),
            (None, None) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Segment;

    fn sample_set() -> Vec<Profile> {
        vec![
            Profile::waypoints(
                "bisque",
                vec![Waypoint::new(0.0, 25.0), Waypoint::new(7200.0, 950.0)],
            ),
            Profile::ramp_hold("glaze", vec![Segment::new(10.0, 200.0, 5.0)]),
            Profile::waypoints("lustre", vec![Waypoint::new(0.0, 25.0)]),
        ]
    }

    fn model() -> ProfileModel {
        let mut model = ProfileModel::new();
        model.replace_profile_set(sample_set());
        model
    }

    #[test]
    fn test_select_unknown_profile() {
        let mut model = model();
        let err = model
            .select_profile("raku", &Configuration::default())
            .unwrap_err();
        assert_eq!(err, SessionError::NotFound("raku".to_string()));
        assert_eq!(model.selected_name(), Some("bisque"));
    }

    #[test]
    fn test_select_computes_energy_and_cost() {
        let mut model = model();
        let info = model
            .select_profile("bisque", &Configuration::default())
            .unwrap();

        assert_eq!(info.eta, "02:00:00");
        assert!((info.energy_kwh - 7.7).abs() < 1e-9);
        assert!((info.cost - 7.7 * 0.26).abs() < 1e-9);
        assert_eq!(info.to_string(), "bisque (02:00:00) 7.70 kWh (AUD: 2.00)");
    }

    #[test]
    fn test_ramp_hold_duration_sums_ramp_and_hold() {
        let mut model = model();
        let info = model
            .select_profile("glaze", &Configuration::default())
            .unwrap();
        assert!((info.duration_s - 1092.0).abs() < 1e-9);
    }

    #[test]
    fn test_replace_keeps_selection_by_name() {
        let mut model = model();
        model
            .select_profile("lustre", &Configuration::default())
            .unwrap();

        let mut reordered = sample_set();
        reordered.reverse();
        model.replace_profile_set(reordered);
        assert_eq!(model.selected_name(), Some("lustre"));
    }

    #[test]
    fn test_replace_falls_back_to_first_then_clears() {
        let mut model = model();
        model
            .select_profile("lustre", &Configuration::default())
            .unwrap();

        model.replace_profile_set(sample_set().into_iter().take(2).collect());
        assert_eq!(model.selected_name(), Some("bisque"));

        model.replace_profile_set(Vec::new());
        assert_eq!(model.selected_name(), None);
        assert!(model.displayed_waypoints().is_empty());
    }

    #[test]
    fn test_selection_hint_before_first_refresh() {
        let mut model = ProfileModel::new();
        assert!(model.apply_selection_hint("glaze"));
        assert_eq!(model.selected_name(), None);

        model.replace_profile_set(sample_set());
        assert_eq!(model.selected_name(), Some("glaze"));
    }

    #[test]
    fn test_unknown_selection_hint_keeps_selection() {
        let mut model = model();
        model.select_profile("lustre", &Configuration::default()).unwrap();

        assert!(!model.apply_selection_hint("gone"));
        assert_eq!(model.selected_name(), Some("lustre"));
        assert!(model.selected_profile().is_some());

        // Nor does it resurface at the next refresh
        model.replace_profile_set(sample_set());
        assert_eq!(model.selected_name(), Some("lustre"));

        assert!(model.apply_selection_hint("glaze"));
        assert_eq!(model.selected_name(), Some("glaze"));
    }

    #[test]
    fn test_deferred_selection_applies_on_refresh() {
        let mut model = model();
        model.defer_selection("cone 6");
        assert_eq!(model.selected_name(), Some("bisque"));

        let mut refreshed = sample_set();
        refreshed.push(Profile::waypoints("cone 6", vec![Waypoint::new(0.0, 25.0)]));
        model.replace_profile_set(refreshed);
        assert_eq!(model.selected_name(), Some("cone 6"));

        // Missing from the refresh: falls back as usual
        model.defer_selection("never saved");
        model.replace_profile_set(sample_set());
        assert_eq!(model.selected_name(), Some("bisque"));
    }

    #[test]
    fn test_edit_copy_does_not_touch_committed_set() {
        let mut model = model();
        model.begin_edit_profile("glaze").unwrap();
        assert_eq!(model.working_copy().unwrap().points.len(), 3);

        model.append_point(100.0).unwrap();
        model.remove_last_point().unwrap();
        model.remove_last_point().unwrap();
        model.upsert_point(0, Waypoint::new(0.0, 20.0)).unwrap();

        assert_eq!(
            model.profile("glaze").unwrap().kind(),
            ProfileKind::RampHold
        );
        assert_eq!(model.working_copy().unwrap().points.len(), 2);
    }

    #[test]
    fn test_append_point_steps_fifteen_seconds() {
        let mut model = model();
        model.begin_new_profile();
        assert_eq!(model.append_point(25.0).unwrap(), Waypoint::new(0.0, 25.0));
        assert_eq!(model.append_point(30.0).unwrap(), Waypoint::new(15.0, 30.0));
        assert_eq!(model.displayed_waypoints().len(), 2);
    }

    #[test]
    fn test_upsert_out_of_range() {
        let mut model = model();
        model.begin_new_profile();
        assert!(matches!(
            model.upsert_point(3, Waypoint::new(0.0, 25.0)),
            Err(SessionError::InvalidProfile(_))
        ));
    }

    #[test]
    fn test_commit_rejects_duplicate_time() {
        let points = [
            Waypoint::new(0.0, 25.0),
            Waypoint::new(300.0, 25.0),
            Waypoint::new(300.0, 400.0),
        ];
        assert!(matches!(
            ProfileModel::commit_edit("bad", &points),
            Err(SessionError::InvalidProfile(_))
        ));
    }

    #[test]
    fn test_commit_rejects_going_back_in_time() {
        let cases: &[&[(f64, f64)]] = &[
            &[(0.0, 25.0), (600.0, 100.0), (300.0, 200.0)],
            &[(60.0, 25.0), (30.0, 100.0)],
            &[(0.0, 25.0), (0.0, 25.0)],
        ];
        for raw in cases {
            let points: Vec<Waypoint> = raw.iter().copied().map(Waypoint::from).collect();
            assert!(ProfileModel::commit_edit("x", &points).is_err(), "{:?}", raw);
        }
    }

    #[test]
    fn test_commit_rejects_non_finite_points() {
        let cases = [
            [Waypoint::new(0.0, 25.0), Waypoint::new(f64::NAN, 100.0)],
            [Waypoint::new(0.0, 25.0), Waypoint::new(f64::INFINITY, 100.0)],
            [Waypoint::new(0.0, 25.0), Waypoint::new(60.0, f64::NAN)],
        ];
        for points in cases {
            assert!(matches!(
                ProfileModel::commit_edit("x", &points),
                Err(SessionError::InvalidProfile(_))
            ));
        }
    }

    #[test]
    fn test_commit_produces_waypoint_profile() {
        let points = [Waypoint::new(0.0, 25.0), Waypoint::new(300.0, 400.0)];
        let profile = ProfileModel::commit_edit(" cone 6 ", &points).unwrap();
        assert_eq!(profile.name, "cone 6");
        assert_eq!(profile.kind(), ProfileKind::Waypoints);
        assert!(ProfileModel::commit_edit("   ", &points).is_err());
    }

    #[test]
    fn test_list_by_kind() {
        let model = model();
        assert_eq!(
            model.list_by_kind(KindFilter::Only(ProfileKind::RampHold)),
            vec![(1, "glaze".to_string())]
        );
        assert_eq!(model.list_by_kind(KindFilter::All).len(), 3);
    }
}
