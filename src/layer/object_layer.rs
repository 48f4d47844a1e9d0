use macroquad::math::Vec2;
use uuid::Uuid;

use crate::config::DuplicateObjectPolicy;
use crate::error::MapError;

use super::{LayerDelegate, Object};

/// A layer holding free-floating objects, addressed by UUID and kept in
/// insertion order. Lookups are linear in the object count.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectLayer {
    delegate: LayerDelegate,
    objects: Vec<Object>,
    policy: DuplicateObjectPolicy,
}

impl ObjectLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_policy(name, DuplicateObjectPolicy::default())
    }

    pub fn with_policy(name: impl Into<String>, policy: DuplicateObjectPolicy) -> Self {
        Self {
            delegate: LayerDelegate::new(name),
            objects: Vec::new(),
            policy,
        }
    }

    #[inline] pub fn delegate(&self) -> &LayerDelegate { &self.delegate }
    #[inline] pub fn delegate_mut(&mut self) -> &mut LayerDelegate { &mut self.delegate }
    #[inline] pub fn policy(&self) -> DuplicateObjectPolicy { self.policy }

    pub fn set_policy(&mut self, policy: DuplicateObjectPolicy) {
        self.policy = policy;
    }

    fn position_of(&self, uuid: Uuid) -> Option<usize> {
        self.objects.iter().position(|obj| obj.uuid() == uuid)
    }

    /// Appends an object. A UUID already present is rejected or overwritten
    /// depending on the layer's [`DuplicateObjectPolicy`]; an overwritten
    /// object keeps its place.
    pub fn add_object(&mut self, object: Object) -> Result<(), MapError> {
        match self.position_of(object.uuid()) {
            Some(_) if self.policy == DuplicateObjectPolicy::Reject => {
                Err(MapError::DuplicateObject { uuid: object.uuid() })
            }
            Some(index) => {
                self.objects[index] = object;
                Ok(())
            }
            None => {
                self.objects.push(object);
                Ok(())
            }
        }
    }

    pub fn remove_object(&mut self, uuid: Uuid) -> Result<Object, MapError> {
        let index = self.position_of(uuid).ok_or(MapError::ObjectNotFound(uuid))?;
        Ok(self.objects.remove(index))
    }

    pub fn find_object(&self, uuid: Uuid) -> Option<&Object> {
        self.objects.iter().find(|obj| obj.uuid() == uuid)
    }

    pub fn find_object_mut(&mut self, uuid: Uuid) -> Option<&mut Object> {
        self.objects.iter_mut().find(|obj| obj.uuid() == uuid)
    }

    /// Hit test; returns the earliest added object whose bounds contain `point`.
    pub fn object_at(&self, point: Vec2, tile_size: Vec2) -> Option<&Object> {
        self.objects
            .iter()
            .find(|obj| obj.bounds(tile_size).contains(point))
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Objects in insertion order.
    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.iter()
    }

    pub(crate) fn objects_mut(&mut self) -> impl Iterator<Item = &mut Object> {
        self.objects.iter_mut()
    }

    /// Copy with fresh identities for the layer and every object.
    pub(crate) fn duplicate(
        &self,
        mut next_object_id: impl FnMut() -> Result<i32, MapError>,
    ) -> Result<Self, MapError> {
        let objects: Vec<Object> = self
            .objects
            .iter()
            .map(|obj| {
                let mut copy = obj.duplicate();
                copy.set_persistent_id(Some(next_object_id()?));
                Ok(copy)
            })
            .collect::<Result<_, MapError>>()?;
        Ok(Self {
            delegate: self.delegate.duplicate(),
            objects,
            policy: self.policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::ObjectKind;
    use macroquad::math::vec2;

    fn rect_at(x: f32, y: f32, w: f32, h: f32) -> Object {
        let mut obj = Object::new(ObjectKind::Rect);
        obj.set_position(vec2(x, y));
        obj.set_size(vec2(w, h));
        obj
    }

    #[test]
    fn duplicate_uuid_is_rejected_by_default() {
        let mut layer = ObjectLayer::new("Objects");
        let obj = rect_at(0.0, 0.0, 1.0, 1.0);
        layer.add_object(obj.clone()).unwrap();
        assert!(matches!(
            layer.add_object(obj),
            Err(MapError::DuplicateObject { .. })
        ));
        assert_eq!(layer.object_count(), 1);
    }

    #[test]
    fn overwrite_policy_replaces_object() {
        let mut layer = ObjectLayer::with_policy("Objects", DuplicateObjectPolicy::Overwrite);
        let mut obj = rect_at(0.0, 0.0, 1.0, 1.0);
        layer.add_object(obj.clone()).unwrap();
        obj.set_tag("moved");
        layer.add_object(obj.clone()).unwrap();
        assert_eq!(layer.object_count(), 1);
        assert_eq!(layer.find_object(obj.uuid()).unwrap().tag(), "moved");
    }

    #[test]
    fn objects_keep_insertion_order() {
        let mut layer = ObjectLayer::with_policy("Objects", DuplicateObjectPolicy::Overwrite);
        let objs: Vec<Object> = (0..8).map(|i| rect_at(i as f32, 0.0, 1.0, 1.0)).collect();
        for obj in &objs {
            layer.add_object(obj.clone()).unwrap();
        }
        let ids: Vec<Uuid> = objs.iter().map(Object::uuid).collect();
        assert_eq!(layer.objects().map(Object::uuid).collect::<Vec<_>>(), ids);

        let mut moved = objs[2].clone();
        moved.set_tag("moved");
        layer.add_object(moved).unwrap();
        layer.remove_object(ids[5]).unwrap();
        let expected: Vec<Uuid> = ids.iter().copied().filter(|id| *id != ids[5]).collect();
        assert_eq!(layer.objects().map(Object::uuid).collect::<Vec<_>>(), expected);

        let copy = layer.duplicate(|| Ok(0)).unwrap();
        let xs: Vec<f32> = copy.objects().map(|o| o.position().x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0, 4.0, 6.0, 7.0]);
    }

    #[test]
    fn overlapping_hit_returns_earliest_object() {
        let mut layer = ObjectLayer::new("Objects");
        let first = rect_at(0.0, 0.0, 10.0, 10.0);
        let first_id = first.uuid();
        layer.add_object(first).unwrap();
        for _ in 0..6 {
            layer.add_object(rect_at(0.0, 0.0, 10.0, 10.0)).unwrap();
        }
        let hit = layer.object_at(vec2(5.0, 5.0), vec2(16.0, 16.0)).map(Object::uuid);
        assert_eq!(hit, Some(first_id));
    }

    #[test]
    fn remove_missing_object_fails() {
        let mut layer = ObjectLayer::new("Objects");
        assert!(matches!(
            layer.remove_object(Uuid::new_v4()),
            Err(MapError::ObjectNotFound(_))
        ));
    }

    #[test]
    fn hit_test_finds_containing_object() {
        let mut layer = ObjectLayer::new("Objects");
        let obj = rect_at(10.0, 10.0, 20.0, 20.0);
        let id = obj.uuid();
        layer.add_object(obj).unwrap();

        let mut point = Object::new(ObjectKind::Point);
        point.set_position(vec2(100.0, 100.0));
        let point_id = point.uuid();
        layer.add_object(point).unwrap();

        let tile = vec2(16.0, 16.0);
        assert_eq!(layer.object_at(vec2(15.0, 25.0), tile).map(Object::uuid), Some(id));
        assert_eq!(layer.object_at(vec2(101.0, 99.0), tile).map(Object::uuid), Some(point_id));
        assert!(layer.object_at(vec2(50.0, 50.0), tile).is_none());
    }
}
