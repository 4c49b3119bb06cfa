use crate::models::cv::CvDocument;

/// Per-request view of the CVs loaded by a listing, searchable by owner.
///
/// Lookups sort by owner id (stable, so equal owners keep their relative
/// order) and then binary search. The set is rebuilt on every request, so
/// paying the sort on each call is fine.
#[derive(Debug, Default, Clone)]
pub struct OwnershipIndex {
    cvs: Vec<CvDocument>,
}

impl OwnershipIndex {
    pub fn new(cvs: Vec<CvDocument>) -> Self {
        Self { cvs }
    }

    /// Finds the CV matching both `user_id` and `profession`.
    pub fn find(&mut self, user_id: i64, profession: &str) -> Option<&CvDocument> {
        let position = self.find_index(user_id, profession)?;
        self.cvs.get(position)
    }

    /// Position of the CV matching both `user_id` and `profession` in the
    /// sorted sequence. An id match alone is not enough: one user can hold
    /// several CVs.
    pub fn find_index(&mut self, user_id: i64, profession: &str) -> Option<usize> {
        self.cvs.sort_by_key(|cv| cv.owner_id);

        // first element with owner_id >= user_id
        let start = self.cvs.partition_point(|cv| cv.owner_id < user_id);

        self.cvs[start..]
            .iter()
            .take_while(|cv| cv.owner_id == user_id)
            .position(|cv| cv.profession == profession)
            .map(|offset| start + offset)
    }

    /// Removes the element at `position`, keeping the rest in order.
    pub fn remove_at(&mut self, position: usize) -> Option<CvDocument> {
        if position >= self.cvs.len() {
            return None;
        }
        Some(self.cvs.remove(position))
    }

    /// Finds and removes the CV owned by `user_id` under `profession`.
    pub fn take(&mut self, user_id: i64, profession: &str) -> Option<CvDocument> {
        let position = self.find_index(user_id, profession)?;
        self.remove_at(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cv::sample_cv;

    fn loaded() -> OwnershipIndex {
        OwnershipIndex::new(vec![
            sample_cv(9, "cook"),
            sample_cv(3, "pilot"),
            sample_cv(5, "welder"),
            sample_cv(3, "cook"),
            sample_cv(1, "cook"),
        ])
    }

    #[test]
    fn shared_profession_resolves_by_owner() {
        let mut index = loaded();
        assert_eq!(index.find(9, "cook").unwrap().owner_id, 9);
        assert_eq!(index.find(3, "cook").unwrap().owner_id, 3);
        assert_eq!(index.find(1, "cook").unwrap().owner_id, 1);
        assert_eq!(index.find(3, "pilot").unwrap().profession, "pilot");
    }

    #[test]
    fn pairs_not_present_are_misses() {
        let mut index = loaded();
        assert!(index.find(9, "pilot").is_none());
        assert!(index.find(4, "cook").is_none());
        assert!(index.find(100, "cook").is_none());
        assert_eq!(index.find_index(0, "cook"), None);
        assert_eq!(index.find_index(5, "cook"), None);
    }

    #[test]
    fn find_index_points_at_the_pair() {
        let mut index = loaded();
        let position = index.find_index(3, "cook").unwrap();
        let hit = index.remove_at(position).unwrap();
        assert_eq!((hit.owner_id, hit.profession.as_str()), (3, "cook"));
    }

    #[test]
    fn removal_splices_and_keeps_order() {
        let mut index = loaded();
        let removed = index.take(3, "pilot").unwrap();
        assert_eq!(removed.profession, "pilot");

        let mut rest = Vec::new();
        while let Some(cv) = index.remove_at(0) {
            rest.push((cv.owner_id, cv.profession));
        }
        assert_eq!(
            rest,
            vec![
                (1, "cook".to_string()),
                (3, "cook".to_string()),
                (5, "welder".to_string()),
                (9, "cook".to_string()),
            ]
        );
    }

    #[test]
    fn removing_the_sole_element_empties_the_index() {
        let mut index = OwnershipIndex::new(vec![sample_cv(3, "cook")]);
        assert!(index.take(3, "cook").is_some());
        assert!(index.take(3, "cook").is_none());
        assert_eq!(index.remove_at(0), None);
    }
}
