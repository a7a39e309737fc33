// Keyboard symbol → gesture layer.

use crate::scene::blend::Layer;

#[derive(Debug, Clone)]
pub struct KeyMap {
    bindings: Vec<(char, Layer)>,
}

impl Default for KeyMap {
    fn default() -> Self {
        Self {
            bindings: vec![
                ('1', Layer::SadPose),
                ('2', Layer::SneakPose),
                ('3', Layer::HeadShake),
                ('4', Layer::Agree),
            ],
        }
    }
}

impl KeyMap {
    pub fn layer_for(&self, symbol: char) -> Option<Layer> {
        self.bindings.iter().find(|(key, _)| *key == symbol).map(|(_, layer)| *layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_map_to_gestures() {
        let keys = KeyMap::default();
        assert_eq!(keys.layer_for('1'), Some(Layer::SadPose));
        assert_eq!(keys.layer_for('4'), Some(Layer::Agree));
        assert_eq!(keys.layer_for('5'), None);
        assert!(('1'..='4').filter_map(|c| keys.layer_for(c)).all(Layer::is_additive));
    }
}
