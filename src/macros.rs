// Class level tag setters shared by every component builder. Expects the
// builder to carry a `tags: ComponentTags` field
macro_rules! component_tag_setters {
    () => {
        /// Sets the group this component is activated with
        pub fn group(mut self, group: crate::GroupId) -> Self {
            self.tags.group = group;
            self
        }

        /// Sets the order of activation within its group, sorted ascending
        pub fn order(mut self, order: i32) -> Self {
            self.tags.order = order;
            self
        }

        /// Restricts where the component is loaded
        pub fn runs_on(mut self, runs_on: crate::RunLocation) -> Self {
            self.tags.runs_on = runs_on;
            self
        }
    };
}
